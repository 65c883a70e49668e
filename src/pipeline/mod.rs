/*!
 * Pipeline execution.
 *
 * - `step`: the step trait and its continuation protocol
 * - `engine`: a chain of steps run event by event, with cancellation
 * - `registry`: filters and steps by name
 * - `driver`: batch processing with per-item reports
 */

pub mod driver;
pub mod engine;
pub mod registry;
pub mod step;

pub use driver::{BatchItem, BatchReport, ItemReport, ItemStatus, NoProgress, PipelineDriver, ProgressSink};
pub use engine::{CancelToken, EventSink, Pipeline, PipelineState};
pub use registry::{FilterRegistry, StepRegistry};
pub use step::{Flow, Step};
