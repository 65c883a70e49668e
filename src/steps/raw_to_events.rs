/*!
 * Extraction step: turns a `RAW_DOCUMENT` into the events of its filter.
 *
 * The filter is picked from the raw document's filter id, or from its file
 * extension. Events are handed out one at a time through `resume`, so the
 * rest of the pipeline sees each one before the next is read.
 */

use log::{debug, info};

use crate::errors::{PipelineError, PipelineResult};
use crate::event::Event;
use crate::filters::Filter;
use crate::locale::LocaleId;
use crate::pipeline::registry::FilterRegistry;
use crate::pipeline::step::{Flow, Step};
use crate::resource::model::Resource;

pub struct RawDocumentToEventsStep {
    registry: FilterRegistry,
    target_locale: Option<LocaleId>,
    filter: Option<Box<dyn Filter>>,
}

impl RawDocumentToEventsStep {
    pub fn new(registry: FilterRegistry) -> Self {
        Self {
            registry,
            target_locale: None,
            filter: None,
        }
    }

    fn release(&mut self) {
        if let Some(mut filter) = self.filter.take() {
            filter.close();
        }
    }
}

impl Step for RawDocumentToEventsStep {
    fn name(&self) -> &str {
        "raw-to-events"
    }

    fn resume(&mut self) -> PipelineResult<Flow> {
        let Some(filter) = self.filter.as_mut() else {
            return Ok(Flow::Done);
        };
        if !filter.has_next() {
            self.release();
            return Ok(Flow::Done);
        }
        let event = match filter.next() {
            Ok(event) => event,
            Err(e) => {
                self.release();
                return Err(e.into());
            }
        };
        if event.is_canceled() {
            self.release();
        }
        Ok(Flow::Produced(event))
    }

    fn cancel(&mut self) {
        if let Some(filter) = self.filter.as_mut() {
            filter.cancel();
        }
    }

    fn destroy(&mut self) {
        self.release();
    }

    fn handle_start_batch_item(&mut self, event: Event) -> PipelineResult<Flow> {
        self.release();
        if let Resource::BatchItem(context) = &event.resource {
            self.target_locale = context.target_locale.clone();
        }
        Ok(Flow::Produced(event))
    }

    fn handle_raw_document(&mut self, event: Event) -> PipelineResult<Flow> {
        let Resource::RawDocument(mut raw) = event.resource else {
            return Err(PipelineError::BadStepInput("RAW_DOCUMENT without raw document".to_string()));
        };
        if raw.target_locale.is_none() {
            raw.target_locale = self.target_locale.clone();
        }

        let filter_id = self.registry.id_for(&raw)?;
        let mut filter = self.registry.create(&filter_id)?;
        info!("Extracting '{}' with {}", raw.name, filter_id);
        filter.open(&raw)?;
        debug!("Filter {} opened '{}'", filter.name(), raw.name);

        self.filter = Some(filter);
        self.resume()
    }

    fn handle_end_batch_item(&mut self, event: Event) -> PipelineResult<Flow> {
        self.release();
        Ok(Flow::Produced(event))
    }

    fn handle_canceled(&mut self, event: Event) -> PipelineResult<Flow> {
        self.release();
        Ok(Flow::Produced(event))
    }
}
