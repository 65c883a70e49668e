/*!
 * Events flowing between pipeline steps.
 *
 * An event pairs an event type with the resource it carries. Events follow
 * a nesting grammar:
 *
 * ```text
 * BATCH    := START_BATCH ITEM* END_BATCH
 * ITEM     := START_BATCH_ITEM (DOCUMENT | RAW_DOCUMENT) END_BATCH_ITEM
 * DOCUMENT := START_DOCUMENT (SUBDOC | UNIT)* END_DOCUMENT
 * SUBDOC   := START_SUBDOCUMENT UNIT* END_SUBDOCUMENT
 * UNIT     := TEXT_UNIT | DOCUMENT_PART | GROUP
 * GROUP    := START_GROUP UNIT* END_GROUP
 * ```
 *
 * `CANCELED` may appear anywhere and ends the batch. `NO_OP` is ignored.
 * The `EventValidator` checks a stream against this grammar.
 */

use std::fmt;

use log::debug;
use serde::Serialize;

use crate::errors::{PipelineError, PipelineResult};
use crate::resource::model::{
    BatchItemContext, DocumentPart, Ending, RawDocument, Resource, StartDocument, StartGroup, StartSubDocument,
    TextUnit,
};

/// Kind of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    StartBatch,
    EndBatch,
    StartBatchItem,
    EndBatchItem,
    RawDocument,
    StartDocument,
    EndDocument,
    StartSubDocument,
    EndSubDocument,
    StartGroup,
    EndGroup,
    TextUnit,
    DocumentPart,
    Canceled,
    NoOp,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::StartBatch => "START_BATCH",
            EventType::EndBatch => "END_BATCH",
            EventType::StartBatchItem => "START_BATCH_ITEM",
            EventType::EndBatchItem => "END_BATCH_ITEM",
            EventType::RawDocument => "RAW_DOCUMENT",
            EventType::StartDocument => "START_DOCUMENT",
            EventType::EndDocument => "END_DOCUMENT",
            EventType::StartSubDocument => "START_SUBDOCUMENT",
            EventType::EndSubDocument => "END_SUBDOCUMENT",
            EventType::StartGroup => "START_GROUP",
            EventType::EndGroup => "END_GROUP",
            EventType::TextUnit => "TEXT_UNIT",
            EventType::DocumentPart => "DOCUMENT_PART",
            EventType::Canceled => "CANCELED",
            EventType::NoOp => "NO_OP",
        };
        f.write_str(name)
    }
}

/// An event and the resource it owns.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub event_type: EventType,
    pub resource: Resource,
}

impl Event {
    pub fn new(event_type: EventType, resource: Resource) -> Self {
        Self { event_type, resource }
    }

    pub fn start_batch() -> Self {
        Self::new(EventType::StartBatch, Resource::None)
    }

    pub fn end_batch() -> Self {
        Self::new(EventType::EndBatch, Resource::None)
    }

    pub fn start_batch_item(context: BatchItemContext) -> Self {
        Self::new(EventType::StartBatchItem, Resource::BatchItem(context))
    }

    pub fn end_batch_item() -> Self {
        Self::new(EventType::EndBatchItem, Resource::None)
    }

    pub fn raw_document(raw: RawDocument) -> Self {
        Self::new(EventType::RawDocument, Resource::RawDocument(raw))
    }

    pub fn start_document(start: StartDocument) -> Self {
        Self::new(EventType::StartDocument, Resource::StartDocument(start))
    }

    pub fn end_document(ending: Ending) -> Self {
        Self::new(EventType::EndDocument, Resource::Ending(ending))
    }

    pub fn start_sub_document(start: StartSubDocument) -> Self {
        Self::new(EventType::StartSubDocument, Resource::StartSubDocument(start))
    }

    pub fn end_sub_document(ending: Ending) -> Self {
        Self::new(EventType::EndSubDocument, Resource::Ending(ending))
    }

    pub fn start_group(start: StartGroup) -> Self {
        Self::new(EventType::StartGroup, Resource::StartGroup(start))
    }

    pub fn end_group(ending: Ending) -> Self {
        Self::new(EventType::EndGroup, Resource::Ending(ending))
    }

    pub fn text_unit(tu: TextUnit) -> Self {
        Self::new(EventType::TextUnit, Resource::TextUnit(tu))
    }

    pub fn document_part(dp: DocumentPart) -> Self {
        Self::new(EventType::DocumentPart, Resource::DocumentPart(dp))
    }

    pub fn canceled() -> Self {
        Self::new(EventType::Canceled, Resource::None)
    }

    pub fn no_op() -> Self {
        Self::new(EventType::NoOp, Resource::None)
    }

    pub fn is_canceled(&self) -> bool {
        self.event_type == EventType::Canceled
    }

    pub fn as_text_unit(&self) -> Option<&TextUnit> {
        match &self.resource {
            Resource::TextUnit(tu) => Some(tu),
            _ => None,
        }
    }

    pub fn as_text_unit_mut(&mut self) -> Option<&mut TextUnit> {
        match &mut self.resource {
            Resource::TextUnit(tu) => Some(tu),
            _ => None,
        }
    }

    pub fn as_raw_document(&self) -> Option<&RawDocument> {
        match &self.resource {
            Resource::RawDocument(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn as_start_document(&self) -> Option<&StartDocument> {
        match &self.resource {
            Resource::StartDocument(start) => Some(start),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Batch,
    /// Inside an item; true once its document has been seen
    Item(bool),
    Document,
    SubDocument,
    Group,
}

/// Streaming checker of the event nesting grammar.
#[derive(Debug, Clone, Default)]
pub struct EventValidator {
    stack: Vec<Frame>,
    strict: bool,
    canceled: bool,
    batches: usize,
}

impl EventValidator {
    /// Validator accepting units directly inside a document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator requiring units to sit inside a sub-document or group.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Check the next event type of the stream.
    pub fn validate(&mut self, event_type: EventType) -> PipelineResult<()> {
        if self.canceled || event_type == EventType::NoOp {
            return Ok(());
        }
        if event_type == EventType::Canceled {
            debug!("Event stream canceled at depth {}", self.stack.len());
            self.canceled = true;
            return Ok(());
        }

        let top = self.stack.last().copied();
        match (top, event_type) {
            (None, EventType::StartBatch) => self.stack.push(Frame::Batch),
            (Some(Frame::Batch), EventType::StartBatchItem) => self.stack.push(Frame::Item(false)),
            (Some(Frame::Batch), EventType::EndBatch) => {
                self.stack.pop();
                self.batches += 1;
            }
            (Some(Frame::Item(false)), EventType::StartDocument) => {
                self.set_item_seen();
                self.stack.push(Frame::Document);
            }
            (Some(Frame::Item(false)), EventType::RawDocument) => self.set_item_seen(),
            (Some(Frame::Item(true)), EventType::EndBatchItem) => {
                self.stack.pop();
            }
            (Some(Frame::Document), EventType::EndDocument) => {
                self.stack.pop();
            }
            (Some(Frame::Document), EventType::StartSubDocument) => self.stack.push(Frame::SubDocument),
            (Some(Frame::SubDocument), EventType::EndSubDocument) => {
                self.stack.pop();
            }
            (Some(Frame::Group), EventType::EndGroup) => {
                self.stack.pop();
            }
            (Some(frame), EventType::TextUnit | EventType::DocumentPart | EventType::StartGroup)
                if self.accepts_units(frame) =>
            {
                if event_type == EventType::StartGroup {
                    self.stack.push(Frame::Group);
                }
            }
            (frame, found) => {
                return Err(PipelineError::ContractViolation {
                    expected: Self::expected(frame, self.strict).to_string(),
                    found: found.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Forget the current item after it failed, so the batch can go on.
    pub fn abort_item(&mut self) {
        while let Some(frame) = self.stack.last() {
            if *frame == Frame::Batch {
                break;
            }
            self.stack.pop();
        }
    }

    /// Whether every opened construct has been closed.
    pub fn is_complete(&self) -> bool {
        self.stack.is_empty() && (self.batches > 0 || self.canceled)
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    fn set_item_seen(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            *frame = Frame::Item(true);
        }
    }

    fn accepts_units(&self, frame: Frame) -> bool {
        match frame {
            Frame::SubDocument | Frame::Group => true,
            Frame::Document => !self.strict,
            Frame::Batch | Frame::Item(_) => false,
        }
    }

    fn expected(frame: Option<Frame>, strict: bool) -> &'static str {
        match frame {
            None => "START_BATCH",
            Some(Frame::Batch) => "START_BATCH_ITEM or END_BATCH",
            Some(Frame::Item(false)) => "START_DOCUMENT or RAW_DOCUMENT",
            Some(Frame::Item(true)) => "END_BATCH_ITEM",
            Some(Frame::Document) if strict => "START_SUBDOCUMENT or END_DOCUMENT",
            Some(Frame::Document) => "a unit, START_SUBDOCUMENT or END_DOCUMENT",
            Some(Frame::SubDocument) => "a unit or END_SUBDOCUMENT",
            Some(Frame::Group) => "a unit or END_GROUP",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(validator: &mut EventValidator, types: &[EventType]) -> PipelineResult<()> {
        for t in types {
            validator.validate(*t)?;
        }
        Ok(())
    }

    #[test]
    fn test_validator_validate_shouldAcceptWellNestedStream() {
        use EventType::*;
        let mut validator = EventValidator::strict();
        run(
            &mut validator,
            &[
                StartBatch,
                StartBatchItem,
                StartDocument,
                StartSubDocument,
                TextUnit,
                StartGroup,
                DocumentPart,
                TextUnit,
                EndGroup,
                EndSubDocument,
                EndDocument,
                EndBatchItem,
                StartBatchItem,
                RawDocument,
                EndBatchItem,
                EndBatch,
            ],
        )
        .unwrap();
        assert!(validator.is_complete());
    }

    #[test]
    fn test_validator_strict_shouldRejectUnitOutsideSubDocument() {
        use EventType::*;
        let mut strict = EventValidator::strict();
        let err = run(&mut strict, &[StartBatch, StartBatchItem, StartDocument, TextUnit]).unwrap_err();
        assert!(matches!(err, PipelineError::ContractViolation { .. }));

        let mut lenient = EventValidator::new();
        run(
            &mut lenient,
            &[StartBatch, StartBatchItem, StartDocument, TextUnit, EndDocument, EndBatchItem, EndBatch],
        )
        .unwrap();
    }

    #[test]
    fn test_validator_validate_shouldRejectMismatchedEnd() {
        use EventType::*;
        let mut validator = EventValidator::new();
        let err = run(&mut validator, &[StartBatch, StartBatchItem, StartDocument, StartGroup, EndDocument]);
        match err {
            Err(PipelineError::ContractViolation { found, .. }) => assert_eq!(found, "END_DOCUMENT"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validator_canceled_shouldAcceptAnythingAfter() {
        use EventType::*;
        let mut validator = EventValidator::new();
        run(&mut validator, &[StartBatch, StartBatchItem, StartDocument, Canceled, EndBatch, TextUnit]).unwrap();
        assert!(validator.is_canceled());
        assert!(validator.is_complete() || validator.is_canceled());
    }

    #[test]
    fn test_validator_abortItem_shouldResumeAtBatchLevel() {
        use EventType::*;
        let mut validator = EventValidator::new();
        run(&mut validator, &[StartBatch, StartBatchItem, StartDocument, StartGroup]).unwrap();
        validator.abort_item();
        run(&mut validator, &[StartBatchItem, RawDocument, EndBatchItem, EndBatch]).unwrap();
        assert!(validator.is_complete());
    }
}
