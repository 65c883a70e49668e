/*!
 * Pipeline steps.
 *
 * A step receives events one at a time and answers with a `Flow`:
 * - `Produced(event)`: pass this event downstream, then call `resume` in
 *   case the step has more to emit for the same input.
 * - `NeedsMore`: the input was kept (buffered) until the step can decide
 *   what to emit; nothing goes downstream for now.
 * - `Done`: nothing (more) to emit for the current input.
 *
 * Steps only override the hooks of the events they care about; every
 * default hook passes the event through unchanged.
 */

use crate::errors::PipelineResult;
use crate::event::{Event, EventType};

/// Answer of a step to one invocation.
#[derive(Debug)]
pub enum Flow {
    /// Event to hand to the next step; the step is asked again with `resume`
    Produced(Event),
    /// The step buffered its input and waits for more events
    NeedsMore,
    /// The step has nothing more to emit for its current input
    Done,
}

/// A processing stage of a pipeline.
///
/// Steps hold state across events (buffers, loaded rules) and must reset it
/// on `START_BATCH`. A pipeline instance is used by one thread at a time.
pub trait Step: Send {
    /// Name used in logs and reports
    fn name(&self) -> &str;

    /// Handle one event.
    ///
    /// The default implementation calls the hook matching the event type.
    fn handle_event(&mut self, event: Event) -> PipelineResult<Flow> {
        dispatch(self, event)
    }

    /// Ask for the next event after a `Produced`.
    ///
    /// # Returns
    /// * `Flow::Produced` while the step has buffered events to emit
    /// * `Flow::Done` once it has nothing left
    fn resume(&mut self) -> PipelineResult<Flow> {
        Ok(Flow::Done)
    }

    /// Whether the step writes the final output of the pipeline
    fn is_last_step(&self) -> bool {
        false
    }

    /// Cancellation was requested; stop long work as soon as possible.
    fn cancel(&mut self) {}

    /// Release every resource held by the step.
    fn destroy(&mut self) {}

    fn handle_start_batch(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    fn handle_end_batch(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    fn handle_start_batch_item(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    fn handle_end_batch_item(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    fn handle_raw_document(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    fn handle_start_document(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    fn handle_end_document(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    fn handle_start_sub_document(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    fn handle_end_sub_document(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    fn handle_start_group(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    fn handle_end_group(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    fn handle_text_unit(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    fn handle_document_part(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }

    /// Cancellation reached this step; release resources and pass it on.
    fn handle_canceled(&mut self, event: Event) -> PipelineResult<Flow> {
        Ok(Flow::Produced(event))
    }
}

/// Route an event to the typed hook of a step.
pub fn dispatch<S: Step + ?Sized>(step: &mut S, event: Event) -> PipelineResult<Flow> {
    match event.event_type {
        EventType::StartBatch => step.handle_start_batch(event),
        EventType::EndBatch => step.handle_end_batch(event),
        EventType::StartBatchItem => step.handle_start_batch_item(event),
        EventType::EndBatchItem => step.handle_end_batch_item(event),
        EventType::RawDocument => step.handle_raw_document(event),
        EventType::StartDocument => step.handle_start_document(event),
        EventType::EndDocument => step.handle_end_document(event),
        EventType::StartSubDocument => step.handle_start_sub_document(event),
        EventType::EndSubDocument => step.handle_end_sub_document(event),
        EventType::StartGroup => step.handle_start_group(event),
        EventType::EndGroup => step.handle_end_group(event),
        EventType::TextUnit => step.handle_text_unit(event),
        EventType::DocumentPart => step.handle_document_part(event),
        EventType::Canceled => step.handle_canceled(event),
        EventType::NoOp => Ok(Flow::Produced(event)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::model::TextUnit;

    struct Uppercase;

    impl Step for Uppercase {
        fn name(&self) -> &str {
            "uppercase"
        }

        fn handle_text_unit(&mut self, mut event: Event) -> PipelineResult<Flow> {
            if let Some(tu) = event.as_text_unit_mut() {
                let text = tu.source().content().to_string().to_uppercase();
                tu.source_mut().set_content(text.as_str().into());
            }
            Ok(Flow::Produced(event))
        }
    }

    #[test]
    fn test_step_dispatch_shouldCallMatchingHook() {
        let mut step = Uppercase;
        let flow = step.handle_event(Event::text_unit(TextUnit::from_text("tu1", "abc"))).unwrap();
        match flow {
            Flow::Produced(event) => {
                assert_eq!(event.as_text_unit().unwrap().source().content().to_string(), "ABC");
            }
            other => panic!("unexpected flow: {:?}", other),
        }
    }

    #[test]
    fn test_step_defaults_shouldPassThrough() {
        let mut step = Uppercase;
        let flow = step.handle_event(Event::start_batch()).unwrap();
        assert!(matches!(flow, Flow::Produced(ref e) if e.event_type == EventType::StartBatch));
        assert!(matches!(step.resume().unwrap(), Flow::Done));
    }
}
