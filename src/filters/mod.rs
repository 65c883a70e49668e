/*!
 * Format filters and writers.
 *
 * A filter turns a raw document into a stream of events; its writer turns
 * the (possibly modified) stream back into a document of the same format.
 *
 * - `detector`: BOM, newline and encoding detection plus text codecs
 * - `writer`: the generic skeleton writer shared by all filters
 * - `subfilter`: nesting one filter's output inside another's
 * - `po`: Gettext PO files
 * - `plaintext`: line-oriented text files
 */

pub mod detector;
pub mod plaintext;
pub mod po;
pub mod subfilter;
pub mod writer;

use std::collections::VecDeque;

use crate::errors::{FilterError, PipelineResult};
use crate::event::Event;
use crate::locale::LocaleId;
use crate::resource::model::{RawDocument, StartDocument};

/// A format filter: parses a raw document into events.
///
/// Events must follow the nesting grammar described in `crate::event`.
pub trait Filter: Send {
    /// Config id of the filter, e.g. "okf_po"
    fn name(&self) -> &str;

    /// MIME type of the documents handled by the filter
    fn mime_type(&self) -> &str;

    /// Open a raw document. Fails fast on unsupported encodings.
    fn open(&mut self, input: &RawDocument) -> Result<(), FilterError>;

    /// Whether `next` has another event
    fn has_next(&self) -> bool;

    /// Next event of the document
    fn next(&mut self) -> Result<Event, FilterError>;

    /// Release the document.
    fn close(&mut self);

    /// Stop the extraction; the next call to `next` returns `CANCELED`.
    fn cancel(&mut self);

    /// Writer able to rebuild documents from this filter's events
    fn create_filter_writer(&self) -> Box<dyn FilterWriter>;

    /// Encoder for text written in this filter's format
    fn create_encoder(&self) -> Box<dyn Encoder> {
        Box::new(DefaultEncoder)
    }
}

/// Rebuilds a document from an event stream.
pub trait FilterWriter: Send {
    /// Locale and encoding of the output.
    fn set_options(&mut self, locale: Option<&LocaleId>, encoding: &str);

    /// Handle one event of the stream.
    fn handle_event(&mut self, event: &Event) -> PipelineResult<()>;

    /// Take the document written so far.
    fn take_output(&mut self) -> String;

    /// Output encoding, as set by `set_options` or taken from the document.
    fn encoding(&self) -> &str;

    /// Whether the output starts with a byte order mark.
    fn has_bom(&self) -> bool;

    /// Release the writer.
    fn close(&mut self) {}
}

/// Escapes text for a given output format.
pub trait Encoder: Send {
    /// Encode translatable text. Inline code data is never passed here.
    fn encode(&self, text: &str) -> String;
}

/// Encoder that writes text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEncoder;

impl Encoder for DefaultEncoder {
    fn encode(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Run a filter over a raw document and collect its events.
pub fn extract_all(filter: &mut dyn Filter, input: &RawDocument) -> Result<Vec<Event>, FilterError> {
    filter.open(input)?;
    let mut events = Vec::new();
    while filter.has_next() {
        events.push(filter.next()?);
    }
    filter.close();
    Ok(events)
}

/// Split text into lines, each keeping its line break (`\n`, `\r\n` or `\r`).
pub fn lines_with_endings(text: &str) -> Vec<(&str, &str)> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push((&text[start..i], &text[i..i + 1]));
                start = i + 1;
            }
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                lines.push((&text[start..i], &text[i..i + 2]));
                i += 1;
                start = i + 1;
            }
            b'\r' => {
                lines.push((&text[start..i], &text[i..i + 1]));
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < text.len() {
        lines.push((&text[start..], ""));
    }
    lines
}

/// Build the `StartDocument` of a freshly decoded raw document.
pub(crate) fn start_document_for(
    input: &RawDocument,
    decoded: &detector::DecodedText,
    filter_name: &str,
    mime_type: &str,
) -> StartDocument {
    let mut start = StartDocument::new("sd1", &input.name, input.source_locale.clone());
    start.encoding = decoded.encoding.clone();
    start.has_bom = decoded.has_bom;
    start.line_break = decoded.newline.as_str().to_string();
    start.filter_id = filter_name.to_string();
    start.mime_type = mime_type.to_string();
    start
}

/// Queue of events prepared by a filter at `open`, handed out by `next`.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    events: VecDeque<Event>,
    open: bool,
    canceled: bool,
    cancel_sent: bool,
}

impl EventQueue {
    pub(crate) fn load(&mut self, events: Vec<Event>) {
        self.events = events.into();
        self.open = true;
        self.canceled = false;
        self.cancel_sent = false;
    }

    pub(crate) fn has_next(&self) -> bool {
        if self.canceled {
            return !self.cancel_sent;
        }
        !self.events.is_empty()
    }

    pub(crate) fn next(&mut self) -> Result<Event, FilterError> {
        if !self.open {
            return Err(FilterError::NotOpen);
        }
        if self.canceled {
            self.events.clear();
            self.cancel_sent = true;
            return Ok(Event::canceled());
        }
        self.events.pop_front().ok_or(FilterError::NotOpen)
    }

    pub(crate) fn cancel(&mut self) {
        self.canceled = true;
    }

    pub(crate) fn close(&mut self) {
        self.events.clear();
        self.open = false;
    }
}
