/*!
 * Pipeline steps.
 *
 * - `raw_to_events`: runs a filter over each raw document
 * - `events_writer`: rebuilds and writes each document
 * - `segmentation`: splits text units into sentences
 * - `leverage`: fills targets from a translation memory
 * - `splice`: merges lines continued with a splicer
 * - `linebreak`, `bom`: byte-level conversions of raw documents
 */

pub mod bom;
pub mod events_writer;
pub mod leverage;
pub mod linebreak;
pub mod raw_to_events;
pub mod segmentation;
pub mod splice;

pub use bom::BomConversionStep;
pub use events_writer::EventsWriterStep;
pub use leverage::LeverageStep;
pub use linebreak::LineBreakConversionStep;
pub use raw_to_events::RawDocumentToEventsStep;
pub use segmentation::{Segmenter, SegmentationStep, SentenceSegmenter};
pub use splice::LineSplicingStep;
