/*!
 * Line-oriented plain text filter: one text unit per non-blank line.
 */

use log::debug;

use crate::errors::FilterError;
use crate::event::Event;
use crate::filters::writer::GenericSkeletonWriter;
use crate::filters::{self, EventQueue, Filter, FilterWriter, detector};
use crate::resource::model::{DocumentPart, Ending, RawDocument, TextUnit};
use crate::resource::skeleton::Skeleton;

pub const FILTER_ID: &str = "okf_plaintext";
pub const MIME_TYPE: &str = "text/plain";

#[derive(Debug, Default)]
pub struct PlainTextFilter {
    queue: EventQueue,
}

impl PlainTextFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for PlainTextFilter {
    fn name(&self) -> &str {
        FILTER_ID
    }

    fn mime_type(&self) -> &str {
        MIME_TYPE
    }

    fn open(&mut self, input: &RawDocument) -> Result<(), FilterError> {
        let bytes = input.read_bytes()?;
        let decoded = detector::decode(&bytes, &input.encoding, &input.name)?;

        let mut events = vec![Event::start_document(filters::start_document_for(
            input, &decoded, FILTER_ID, MIME_TYPE,
        ))];
        let (mut tu_count, mut dp_count) = (0, 0);
        for (body, ending) in filters::lines_with_endings(&decoded.text) {
            if body.trim().is_empty() {
                dp_count += 1;
                let literal = format!("{}{}", body, ending);
                events.push(Event::document_part(DocumentPart::new(
                    &format!("dp{}", dp_count),
                    Skeleton::from_literal(&literal),
                )));
                continue;
            }
            tu_count += 1;
            let mut tu = TextUnit::from_text(&format!("tu{}", tu_count), body);
            tu.mime_type = Some(MIME_TYPE.to_string());
            tu.preserve_whitespace = true;
            let mut skeleton = Skeleton::new();
            skeleton.add_content_ref(&tu.id);
            skeleton.add_literal(ending);
            tu.skeleton = Some(skeleton);
            events.push(Event::text_unit(tu));
        }
        events.push(Event::end_document(Ending::new("ed1")));

        debug!("Plain text filter found {} lines to translate in '{}'", tu_count, input.name);
        self.queue.load(events);
        Ok(())
    }

    fn has_next(&self) -> bool {
        self.queue.has_next()
    }

    fn next(&mut self) -> Result<Event, FilterError> {
        self.queue.next()
    }

    fn close(&mut self) {
        self.queue.close();
    }

    fn cancel(&mut self) {
        self.queue.cancel();
    }

    fn create_filter_writer(&self) -> Box<dyn FilterWriter> {
        Box::new(GenericSkeletonWriter::new(self.create_encoder()))
    }
}
