/*!
 * Writer step: rebuilds each document with the writer of its filter and
 * saves it to the output path of the batch item.
 *
 * Events are passed on unchanged. The file is written on `END_DOCUMENT`
 * through a temporary file in the output directory, so a failed or canceled
 * item never leaves a partial output behind.
 */

use std::path::Path;

use log::{debug, info, warn};

use crate::errors::{PipelineError, PipelineResult};
use crate::event::Event;
use crate::file_utils::FileManager;
use crate::filters::{FilterWriter, detector};
use crate::pipeline::registry::FilterRegistry;
use crate::pipeline::step::{Flow, Step};
use crate::resource::model::{BatchItemContext, Resource};

pub struct EventsWriterStep {
    registry: FilterRegistry,
    output_encoding: Option<String>,
    context: Option<BatchItemContext>,
    writer: Option<Box<dyn FilterWriter>>,
}

impl EventsWriterStep {
    pub fn new(registry: FilterRegistry) -> Self {
        Self {
            registry,
            output_encoding: None,
            context: None,
            writer: None,
        }
    }

    /// Encoding used when the batch item does not set one
    pub fn with_output_encoding(mut self, encoding: Option<String>) -> Self {
        self.output_encoding = encoding;
        self
    }

    fn feed(&mut self, event: &Event) -> PipelineResult<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.handle_event(event),
            None => Ok(()),
        }
    }

    fn finish_document(&mut self) -> PipelineResult<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        let output = writer.take_output();
        let encoding = writer.encoding().to_string();
        let has_bom = writer.has_bom();
        writer.close();

        let Some(path) = self.context.as_ref().and_then(|c| c.output_path.clone()) else {
            warn!("No output path for this item, output discarded");
            return Ok(());
        };
        let bytes = detector::encode_with_bom(&output, &encoding, has_bom)?;
        write_atomically(&path, &bytes)?;
        info!("Wrote {} ({} bytes, {})", path.display(), bytes.len(), encoding);
        Ok(())
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> PipelineResult<()> {
    FileManager::write_atomically(path, bytes).map_err(|e| PipelineError::IoFailure {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

impl Step for EventsWriterStep {
    fn name(&self) -> &str {
        "events-writer"
    }

    fn is_last_step(&self) -> bool {
        true
    }

    fn destroy(&mut self) {
        self.writer = None;
        self.context = None;
    }

    fn handle_start_batch_item(&mut self, event: Event) -> PipelineResult<Flow> {
        self.writer = None;
        if let Resource::BatchItem(context) = &event.resource {
            self.context = Some(context.clone());
        }
        Ok(Flow::Produced(event))
    }

    /// A raw document reaching the writer was not extracted; its bytes are
    /// the output.
    fn handle_raw_document(&mut self, event: Event) -> PipelineResult<Flow> {
        if let Some(raw) = event.as_raw_document() {
            match self.context.as_ref().and_then(|c| c.output_path.clone()) {
                Some(path) => {
                    let bytes = raw.read_bytes()?;
                    write_atomically(&path, &bytes)?;
                    info!("Wrote {} ({} bytes, raw)", path.display(), bytes.len());
                }
                None => warn!("No output path for '{}', output discarded", raw.name),
            }
        }
        Ok(Flow::Produced(event))
    }

    fn handle_start_document(&mut self, event: Event) -> PipelineResult<Flow> {
        if let Resource::StartDocument(start) = &event.resource {
            let mut writer = self.registry.create_writer(&start.filter_id)?;
            let context = self.context.as_ref();
            let encoding = context
                .and_then(|c| c.output_encoding.clone())
                .or_else(|| self.output_encoding.clone())
                .unwrap_or_default();
            writer.set_options(context.and_then(|c| c.target_locale.as_ref()), &encoding);
            debug!("Writer for '{}' created ({})", start.name, start.filter_id);
            self.writer = Some(writer);
        }
        self.feed(&event)?;
        Ok(Flow::Produced(event))
    }

    fn handle_end_document(&mut self, event: Event) -> PipelineResult<Flow> {
        self.feed(&event)?;
        self.finish_document()?;
        Ok(Flow::Produced(event))
    }

    fn handle_start_sub_document(&mut self, event: Event) -> PipelineResult<Flow> {
        self.feed(&event)?;
        Ok(Flow::Produced(event))
    }

    fn handle_end_sub_document(&mut self, event: Event) -> PipelineResult<Flow> {
        self.feed(&event)?;
        Ok(Flow::Produced(event))
    }

    fn handle_start_group(&mut self, event: Event) -> PipelineResult<Flow> {
        self.feed(&event)?;
        Ok(Flow::Produced(event))
    }

    fn handle_end_group(&mut self, event: Event) -> PipelineResult<Flow> {
        self.feed(&event)?;
        Ok(Flow::Produced(event))
    }

    fn handle_text_unit(&mut self, event: Event) -> PipelineResult<Flow> {
        self.feed(&event)?;
        Ok(Flow::Produced(event))
    }

    fn handle_document_part(&mut self, event: Event) -> PipelineResult<Flow> {
        self.feed(&event)?;
        Ok(Flow::Produced(event))
    }

    fn handle_end_batch_item(&mut self, event: Event) -> PipelineResult<Flow> {
        self.writer = None;
        Ok(Flow::Produced(event))
    }

    fn handle_canceled(&mut self, event: Event) -> PipelineResult<Flow> {
        self.writer = None;
        Ok(Flow::Produced(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::LocaleId;
    use crate::pipeline::engine::{Pipeline, run_batch};
    use crate::resource::model::RawDocument;
    use crate::steps::RawDocumentToEventsStep;

    fn pipeline() -> Pipeline {
        Pipeline::new()
            .with_step(Box::new(RawDocumentToEventsStep::new(FilterRegistry::new())))
            .with_step(Box::new(EventsWriterStep::new(FilterRegistry::new())))
    }

    #[test]
    fn test_eventsWriter_roundTrip_shouldWriteIdenticalFile() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("a.po");
        let input = "# comment\nmsgid \"Hello\"\nmsgstr \"Bonjour\"\n";
        let raw = RawDocument::from_text("a.po", input, LocaleId::new("en").unwrap());
        let context = BatchItemContext {
            output_path: Some(output.clone()),
            target_locale: Some(LocaleId::new("fr").unwrap()),
            ..BatchItemContext::default()
        };

        run_batch(&mut pipeline(), vec![(context, Event::raw_document(raw))]).unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), input);
    }

    #[test]
    fn test_eventsWriter_utf16WithBom_shouldKeepEncodingAndBom() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("a.txt");
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend("héllo\n".encode_utf16().flat_map(u16::to_le_bytes));
        let raw = RawDocument::from_bytes("a.txt", bytes.clone(), "UTF-8", LocaleId::new("en").unwrap());
        let context = BatchItemContext {
            output_path: Some(output.clone()),
            ..BatchItemContext::default()
        };

        run_batch(&mut pipeline(), vec![(context, Event::raw_document(raw))]).unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), bytes);
    }

    #[test]
    fn test_eventsWriter_rawDocument_shouldWriteBytes() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("raw.bin");
        let raw = RawDocument::from_bytes("raw.bin", vec![1, 2, 3], "UTF-8", LocaleId::new("en").unwrap());
        let context = BatchItemContext {
            output_path: Some(output.clone()),
            ..BatchItemContext::default()
        };
        let mut pipeline = Pipeline::new().with_step(Box::new(EventsWriterStep::new(FilterRegistry::new())));

        run_batch(&mut pipeline, vec![(context, Event::raw_document(raw))]).unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), vec![1, 2, 3]);
    }
}
