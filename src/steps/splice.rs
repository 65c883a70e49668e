/*!
 * Line splicing step.
 *
 * A text unit whose source ends with the splicer (`\` by default) continues
 * on the next one. Such units are held back until a unit without splicer
 * arrives, then the whole run is merged into the first unit. The splicer and
 * the line break between two lines become placeholder codes, so writing the
 * merged unit gives back the original lines.
 *
 * Held units that never see their last line are emitted unchanged at the
 * next non text unit event. Cancellation drops them.
 */

use std::collections::VecDeque;

use log::{debug, warn};

use crate::errors::PipelineResult;
use crate::event::{Event, EventType};
use crate::pipeline::step::{Flow, Step, dispatch};
use crate::resource::code::TagType;
use crate::resource::container::TextContainer;
use crate::resource::fragment::TextFragment;
use crate::resource::model::{Resource, TextUnit};
use crate::resource::skeleton::{RefProperty, Skeleton, SkeletonPart};

pub const SPLICER_CODE: &str = "line splicer";
pub const LINE_BREAK_CODE: &str = "line break";

pub struct LineSplicingStep {
    splicer: String,
    create_placeholders: bool,
    pending: Vec<TextUnit>,
    queue: VecDeque<Event>,
}

impl LineSplicingStep {
    pub fn new(splicer: &str, create_placeholders: bool) -> Self {
        Self {
            splicer: splicer.to_string(),
            create_placeholders,
            pending: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    fn is_spliced(&self, tu: &TextUnit) -> bool {
        !self.splicer.is_empty() && tu.source().content().coded_text().ends_with(&self.splicer)
    }

    /// Emit the held units as they came.
    fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!("Releasing {} unfinished spliced line(s)", self.pending.len());
        }
        for tu in self.pending.drain(..) {
            self.queue.push_back(Event::text_unit(tu));
        }
    }

    /// Merge the held units and `last` into one unit.
    fn merge(&self, units: &[TextUnit]) -> Option<TextUnit> {
        let shapes: Vec<(String, String)> = units.iter().map(split_skeleton).collect::<Option<_>>()?;
        let splicer_len = self.splicer.chars().count();

        let mut merged = TextFragment::new();
        for (i, tu) in units.iter().enumerate() {
            let mut fragment = tu.source().content();
            let Some(next) = shapes.get(i + 1) else {
                merged.append_fragment(&fragment);
                break;
            };
            let line_break = format!("{}{}", shapes[i].1, next.0);
            if self.create_placeholders {
                let len = fragment.len();
                fragment.remove(len - splicer_len, len).ok()?;
                merged.append_fragment(&fragment);
                merged.append_code(TagType::Placeholder, SPLICER_CODE, &self.splicer);
                merged.append_code(TagType::Placeholder, LINE_BREAK_CODE, &line_break);
            } else {
                merged.append_fragment(&fragment);
                merged.append_text(&line_break);
            }
        }
        merged.renumber_codes();

        let first = units.first()?;
        let mut tu = first.clone();
        tu.set_source(TextContainer::from_fragment(merged));
        let mut skeleton = Skeleton::from_literal(&shapes[0].0);
        skeleton.add_content_ref(&tu.id);
        skeleton.add_literal(&shapes[shapes.len() - 1].1);
        tu.skeleton = Some(skeleton);
        Some(tu)
    }
}

/// Literal text before and after the unit's own content reference, when its
/// skeleton has no other reference.
fn split_skeleton(tu: &TextUnit) -> Option<(String, String)> {
    let skeleton = tu.skeleton.as_ref()?;
    let (mut prefix, mut suffix) = (String::new(), String::new());
    let mut seen = false;
    for part in skeleton.parts() {
        match part {
            SkeletonPart::Literal(text) if seen => suffix.push_str(text),
            SkeletonPart::Literal(text) => prefix.push_str(text),
            SkeletonPart::Reference {
                resource_id,
                property: RefProperty::Content,
            } if !seen && *resource_id == tu.id => seen = true,
            SkeletonPart::Reference { .. } => return None,
        }
    }
    seen.then_some((prefix, suffix))
}

impl Step for LineSplicingStep {
    fn name(&self) -> &str {
        "splice-lines"
    }

    fn handle_event(&mut self, event: Event) -> PipelineResult<Flow> {
        if !matches!(event.event_type, EventType::TextUnit | EventType::Canceled) && !self.pending.is_empty() {
            self.flush_pending();
            self.queue.push_back(event);
            return self.resume();
        }
        dispatch(self, event)
    }

    fn resume(&mut self) -> PipelineResult<Flow> {
        Ok(self.queue.pop_front().map(Flow::Produced).unwrap_or(Flow::Done))
    }

    fn destroy(&mut self) {
        self.pending.clear();
        self.queue.clear();
    }

    fn handle_start_batch(&mut self, event: Event) -> PipelineResult<Flow> {
        self.pending.clear();
        self.queue.clear();
        Ok(Flow::Produced(event))
    }

    fn handle_text_unit(&mut self, event: Event) -> PipelineResult<Flow> {
        let tu = match event.resource {
            Resource::TextUnit(tu) => tu,
            other => return Ok(Flow::Produced(Event::new(event.event_type, other))),
        };
        if self.is_spliced(&tu) {
            self.pending.push(tu);
            return Ok(Flow::NeedsMore);
        }
        if self.pending.is_empty() {
            return Ok(Flow::Produced(Event::text_unit(tu)));
        }

        self.pending.push(tu);
        match self.merge(&self.pending) {
            Some(merged) => {
                debug!("Spliced {} lines into '{}'", self.pending.len(), merged.id);
                self.pending.clear();
                self.queue.push_back(Event::text_unit(merged));
            }
            None => {
                warn!("Cannot splice lines starting at '{}', kept as is", self.pending[0].id);
                self.flush_pending();
            }
        }
        self.resume()
    }

    fn handle_end_batch_item(&mut self, event: Event) -> PipelineResult<Flow> {
        self.pending.clear();
        self.queue.clear();
        Ok(Flow::Produced(event))
    }

    fn handle_canceled(&mut self, event: Event) -> PipelineResult<Flow> {
        if !self.pending.is_empty() || !self.queue.is_empty() {
            debug!("Dropping {} held and {} queued event(s) on cancel", self.pending.len(), self.queue.len());
        }
        self.pending.clear();
        self.queue.clear();
        Ok(Flow::Produced(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::LocaleId;
    use crate::errors::PipelineError;
    use crate::pipeline::engine::{CancelToken, Pipeline, run_batch, run_to_vec};
    use crate::pipeline::registry::FilterRegistry;
    use crate::resource::model::{BatchItemContext, Ending, RawDocument};
    use crate::steps::{EventsWriterStep, RawDocumentToEventsStep};

    const INPUT: &str = "alpha \\\nbeta \\\r\ngamma\ndelta\n";

    fn round_trip(create_placeholders: bool) -> (Vec<TextUnit>, String) {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let mut pipeline = Pipeline::new()
            .with_step(Box::new(RawDocumentToEventsStep::new(FilterRegistry::new())))
            .with_step(Box::new(LineSplicingStep::new("\\", create_placeholders)))
            .with_step(Box::new(EventsWriterStep::new(FilterRegistry::new())));
        let context = BatchItemContext {
            output_path: Some(output.clone()),
            ..BatchItemContext::default()
        };
        let raw = RawDocument::from_text("in.txt", INPUT, LocaleId::new("en").unwrap());

        let events = run_batch(&mut pipeline, vec![(context, Event::raw_document(raw))]).unwrap();
        let units = events.iter().filter_map(|e| e.as_text_unit().cloned()).collect();
        (units, std::fs::read_to_string(&output).unwrap())
    }

    #[test]
    fn test_lineSplicing_placeholders_shouldMergeAndRoundTrip() {
        let (units, written) = round_trip(true);

        assert_eq!(units.len(), 2);
        let merged = units[0].source().content();
        assert_eq!(merged.to_display_text(), "alpha beta gamma");
        assert_eq!(merged.codes().len(), 4);
        assert_eq!(merged.codes()[1].tag_name, LINE_BREAK_CODE);
        assert_eq!(merged.codes()[3].data, "\r\n");
        assert_eq!(written, INPUT);
    }

    #[test]
    fn test_lineSplicing_withoutPlaceholders_shouldKeepPlainText() {
        let (units, written) = round_trip(false);

        assert_eq!(units.len(), 2);
        assert!(!units[0].source().content().has_code());
        assert_eq!(units[0].source().content().to_string(), "alpha \\\nbeta \\\r\ngamma");
        assert_eq!(written, INPUT);
    }

    #[test]
    fn test_lineSplicing_endOfDocument_shouldReleaseHeldLines() {
        let mut tu = TextUnit::from_text("tu1", "dangling \\");
        let mut skeleton = Skeleton::new();
        skeleton.add_content_ref("tu1");
        skeleton.add_literal("\n");
        tu.skeleton = Some(skeleton);
        let mut pipeline = Pipeline::new().with_step(Box::new(LineSplicingStep::new("\\", true)));

        let events = run_to_vec(&mut pipeline, vec![Event::text_unit(tu), Event::end_document(Ending::new("ed1"))]).unwrap();

        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::TextUnit, EventType::EndDocument]);
        assert_eq!(events[0].as_text_unit().unwrap().source().content().to_string(), "dangling \\");
    }

    struct CancelOnFirstUnit {
        token: CancelToken,
    }

    impl Step for CancelOnFirstUnit {
        fn name(&self) -> &str {
            "cancel-on-first-unit"
        }

        fn handle_text_unit(&mut self, event: Event) -> PipelineResult<Flow> {
            self.token.cancel();
            Ok(Flow::Produced(event))
        }
    }

    #[test]
    fn test_lineSplicing_canceledWhileReleasing_shouldEndWithCanceled() {
        let mut pipeline = Pipeline::new()
            .with_step(Box::new(RawDocumentToEventsStep::new(FilterRegistry::new())))
            .with_step(Box::new(LineSplicingStep::new("\\", true)));
        let token = pipeline.cancel_token();
        pipeline.add_step(Box::new(CancelOnFirstUnit { token }));

        let mut events = Vec::new();
        let mut sink = |event: Event| -> PipelineResult<()> {
            events.push(event);
            Ok(())
        };
        pipeline.start_batch(&mut sink).unwrap();
        let raw = RawDocument::from_text("in.txt", "a \\\nb \\\n", LocaleId::new("en").unwrap());
        let result = pipeline.process(BatchItemContext::default(), Event::raw_document(raw), &mut sink);

        assert!(matches!(result, Err(PipelineError::Canceled)));
        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(types.last(), Some(&EventType::Canceled));
        assert_eq!(types.iter().filter(|t| **t == EventType::TextUnit).count(), 1);
        assert!(!types.contains(&EventType::EndDocument));
    }
}
