/*!
 * Line break conversion on raw documents.
 */

use log::debug;

use crate::errors::{PipelineError, PipelineResult};
use crate::event::Event;
use crate::filters::detector::{self, NewlineType};
use crate::pipeline::step::{Flow, Step};
use crate::resource::model::Resource;

/// Rewrites every CR, LF and CRLF of a document to one line break type.
/// The encoding and byte order mark of the input are kept.
pub struct LineBreakConversionStep {
    line_break: NewlineType,
}

impl LineBreakConversionStep {
    pub fn new(line_break: NewlineType) -> Self {
        Self { line_break }
    }
}

/// Replace all line breaks of `text` with `line_break`.
pub fn convert_line_breaks(text: &str, line_break: NewlineType) -> String {
    let target = line_break.as_str();
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str(target);
            }
            '\n' => out.push_str(target),
            other => out.push(other),
        }
    }
    out
}

impl Step for LineBreakConversionStep {
    fn name(&self) -> &str {
        "linebreak-conversion"
    }

    fn handle_raw_document(&mut self, mut event: Event) -> PipelineResult<Flow> {
        let Resource::RawDocument(raw) = &mut event.resource else {
            return Err(PipelineError::BadStepInput("RAW_DOCUMENT without raw document".to_string()));
        };
        let bytes = raw.read_bytes()?;
        let decoded = detector::decode(&bytes, &raw.encoding, &raw.name)?;
        let converted = convert_line_breaks(&decoded.text, self.line_break);
        debug!("'{}': line breaks {} -> {}", raw.name, decoded.newline, self.line_break);

        raw.set_bytes(detector::encode_with_bom(&converted, &decoded.encoding, decoded.has_bom)?);
        raw.encoding = decoded.encoding;
        Ok(Flow::Produced(event))
    }
}
