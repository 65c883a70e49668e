/*!
 * Batch driver.
 *
 * Runs a pipeline over a list of documents: `START_BATCH`, then for each
 * item `START_BATCH_ITEM`, `RAW_DOCUMENT`, `END_BATCH_ITEM`, then `END_BATCH`.
 * A failing item is reported and the batch goes on with the next one; a
 * contract violation or a cancellation stops the batch.
 */

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::app_config::Config;
use crate::errors::{ItemFailure, PipelineError, PipelineResult};
use crate::event::{Event, EventValidator};
use crate::locale::LocaleId;
use crate::pipeline::engine::{CancelToken, Pipeline};
use crate::pipeline::registry::{FilterRegistry, StepRegistry};
use crate::resource::model::{BatchItemContext, RawDocument};

/// One document to process.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub input: RawDocument,
    pub output_path: Option<PathBuf>,
    pub output_encoding: Option<String>,
    pub target_locale: Option<LocaleId>,
}

impl BatchItem {
    pub fn new(input: RawDocument) -> Self {
        Self {
            input,
            output_path: None,
            output_encoding: None,
            target_locale: None,
        }
    }

    pub fn with_output(mut self, path: PathBuf) -> Self {
        self.output_path = Some(path);
        self
    }

    pub fn with_output_encoding(mut self, encoding: &str) -> Self {
        self.output_encoding = Some(encoding.to_string());
        self
    }

    pub fn with_target_locale(mut self, locale: LocaleId) -> Self {
        self.target_locale = Some(locale);
        self
    }
}

/// Outcome of one item.
#[derive(Debug)]
pub enum ItemStatus {
    Succeeded { output: Option<PathBuf> },
    Failed(ItemFailure),
    /// The batch was canceled before or while processing the item
    Canceled,
}

impl ItemStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemStatus::Succeeded { .. })
    }
}

#[derive(Debug)]
pub struct ItemReport {
    /// Name of the input document
    pub document: String,
    pub status: ItemStatus,
    /// Events that left the pipeline for this item
    pub events: usize,
}

/// Result of a whole batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
    pub canceled: bool,
    pub duration: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.status, ItemStatus::Failed(_)))
            .count()
    }

    /// Item failures, in batch order
    pub fn failures(&self) -> Vec<&ItemFailure> {
        self.items
            .iter()
            .filter_map(|i| match &i.status {
                ItemStatus::Failed(failure) => Some(failure),
                _ => None,
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        let canceled = self.items.len() - self.succeeded() - self.failed();
        format!(
            "{} processed, {} failed, {} canceled in {}",
            self.succeeded(),
            self.failed(),
            canceled,
            format_duration(self.duration)
        )
    }
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, duration.subsec_millis())
    }
}

/// Notified as the driver goes through the batch.
pub trait ProgressSink {
    fn item_started(&mut self, _index: usize, _total: usize, _document: &str) {}

    fn item_finished(&mut self, _index: usize, _status: &ItemStatus) {}

    fn batch_finished(&mut self, _report: &BatchReport) {}
}

/// Progress sink that ignores everything.
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Runs batches through one pipeline.
pub struct PipelineDriver {
    pipeline: Pipeline,
    validator: Option<EventValidator>,
}

impl PipelineDriver {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            validator: None,
        }
    }

    /// Driver for the pipeline listed in the configuration.
    pub fn from_config(config: &Config, filters: &FilterRegistry, steps: &StepRegistry) -> PipelineResult<Self> {
        let pipeline = steps.build_pipeline(config, filters)?;
        Ok(Self::new(pipeline).with_validation(config.validate_events))
    }

    /// Check the event grammar of everything leaving the pipeline
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validator = validate.then(EventValidator::new);
        self
    }

    /// Check the grammar, also requiring units to sit in a sub-document or group
    pub fn with_strict_validation(mut self) -> Self {
        self.validator = Some(EventValidator::strict());
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.pipeline.cancel_token()
    }

    /// Process every item and report each outcome.
    ///
    /// # Returns
    /// * The batch report, also when items failed or the batch was canceled
    /// * An error when the batch could not go on (contract violation, unknown component)
    pub fn process_batch(&mut self, items: Vec<BatchItem>, progress: &mut dyn ProgressSink) -> PipelineResult<BatchReport> {
        let start_time = Instant::now();
        let mut report = BatchReport::default();
        let mut validator = self.validator.clone();
        let mut last_resource: Option<String> = None;
        let mut events = 0;

        let started = {
            let mut sink = |event: Event| observe(&mut validator, &mut last_resource, &mut events, &event);
            self.pipeline.start_batch(&mut sink)
        };
        match started {
            Ok(()) => {}
            Err(PipelineError::Canceled) => report.canceled = true,
            Err(e) => return Err(e),
        }

        let total = items.len();
        for (index, item) in items.into_iter().enumerate() {
            let document = item.input.name.clone();
            if report.canceled {
                report.items.push(ItemReport {
                    document,
                    status: ItemStatus::Canceled,
                    events: 0,
                });
                continue;
            }
            progress.item_started(index, total, &document);
            info!("Processing {} ({}/{})", document, index + 1, total);

            let context = BatchItemContext {
                index,
                document: document.clone(),
                output_path: item.output_path.clone(),
                output_encoding: item.output_encoding.clone(),
                target_locale: item.target_locale.clone().or_else(|| item.input.target_locale.clone()),
            };
            events = 0;
            last_resource = None;
            let result = {
                let mut sink = |event: Event| observe(&mut validator, &mut last_resource, &mut events, &event);
                self.pipeline.process(context, Event::raw_document(item.input), &mut sink)
            };

            let status = match result {
                Ok(()) => ItemStatus::Succeeded {
                    output: item.output_path,
                },
                Err(PipelineError::Canceled) => {
                    warn!("Batch canceled while processing {}", document);
                    report.canceled = true;
                    ItemStatus::Canceled
                }
                Err(e) if e.is_batch_fatal() => {
                    error!("Batch stopped at {}: {}", document, e);
                    return Err(e);
                }
                Err(e) => {
                    let mut failure = ItemFailure::new(&document, e);
                    if let Some(id) = &last_resource {
                        failure = failure.with_resource(id);
                    }
                    error!("Error processing file {}", failure);
                    if let Some(validator) = validator.as_mut() {
                        validator.abort_item();
                    }
                    ItemStatus::Failed(failure)
                }
            };
            progress.item_finished(index, &status);
            report.items.push(ItemReport { document, status, events });
        }

        if !report.canceled {
            let mut sink = |event: Event| observe(&mut validator, &mut last_resource, &mut events, &event);
            self.pipeline.end_batch(&mut sink)?;
            if let Some(validator) = &validator {
                if !validator.is_complete() {
                    return Err(PipelineError::ContractViolation {
                        expected: "END_BATCH".to_string(),
                        found: "end of stream".to_string(),
                    });
                }
            }
        }

        report.duration = start_time.elapsed();
        info!("Batch completed: {}", report.summary());
        progress.batch_finished(&report);
        Ok(report)
    }

    /// Release the steps of the pipeline.
    pub fn destroy(&mut self) {
        self.pipeline.destroy();
    }
}

fn observe(
    validator: &mut Option<EventValidator>,
    last_resource: &mut Option<String>,
    events: &mut usize,
    event: &Event,
) -> PipelineResult<()> {
    *events += 1;
    if let Some(validator) = validator.as_mut() {
        validator.validate(event.event_type)?;
    }
    if let Some(id) = event.resource.id() {
        *last_resource = Some(id.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{EventsWriterStep, RawDocumentToEventsStep};

    fn en() -> LocaleId {
        LocaleId::new("en").unwrap()
    }

    fn driver() -> PipelineDriver {
        let pipeline = Pipeline::new()
            .with_step(Box::new(RawDocumentToEventsStep::new(FilterRegistry::new())))
            .with_step(Box::new(EventsWriterStep::new(FilterRegistry::new())));
        PipelineDriver::new(pipeline).with_validation(true)
    }

    fn item(dir: &std::path::Path, name: &str, text: &str) -> BatchItem {
        BatchItem::new(RawDocument::from_text(name, text, en()))
            .with_output(dir.join(name))
            .with_target_locale(LocaleId::new("fr").unwrap())
    }

    struct CancelAt {
        index: usize,
        token: CancelToken,
        started: Vec<String>,
    }

    impl ProgressSink for CancelAt {
        fn item_started(&mut self, index: usize, _total: usize, document: &str) {
            self.started.push(document.to_string());
            if index == self.index {
                self.token.cancel();
            }
        }
    }

    #[test]
    fn test_driver_failingItem_shouldNotStopBatch() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![
            item(dir.path(), "a.po", "msgid \"One\"\nmsgstr \"Un\"\n"),
            item(dir.path(), "b.po", "msgid \"Two\nmsgstr \"\"\n"),
            item(dir.path(), "c.txt", "three\n"),
        ];

        let report = driver().process_batch(items, &mut NoProgress).unwrap();

        assert_eq!(report.items.len(), 3);
        assert!(report.items[0].status.is_success());
        assert!(matches!(report.items[1].status, ItemStatus::Failed(_)));
        assert!(report.items[2].status.is_success());
        assert_eq!(report.failures()[0].document, "b.po");
        assert_eq!(std::fs::read_to_string(dir.path().join("c.txt")).unwrap(), "three\n");
        assert!(!dir.path().join("b.po").exists());
    }

    #[test]
    fn test_driver_cancel_shouldMarkRemainingItems() {
        let dir = tempfile::tempdir().unwrap();
        let mut driver = driver();
        let mut progress = CancelAt {
            index: 1,
            token: driver.cancel_token(),
            started: Vec::new(),
        };
        let items = vec![
            item(dir.path(), "a.txt", "one\n"),
            item(dir.path(), "b.txt", "two\n"),
            item(dir.path(), "c.txt", "three\n"),
        ];

        let report = driver.process_batch(items, &mut progress).unwrap();

        assert!(report.canceled);
        assert!(report.items[0].status.is_success());
        assert!(matches!(report.items[1].status, ItemStatus::Canceled));
        assert!(matches!(report.items[2].status, ItemStatus::Canceled));
        assert_eq!(progress.started, vec!["a.txt", "b.txt"]);
        assert!(!dir.path().join("b.txt").exists());
    }

    #[test]
    fn test_driver_fromConfig_unknownStep_shouldFail() {
        let mut config = Config::default();
        config.pipeline.steps = vec!["no-such-step".to_string()];

        let result = PipelineDriver::from_config(&config, &FilterRegistry::new(), &StepRegistry::new());
        assert!(matches!(result, Err(PipelineError::UnknownComponent(_))));
    }
}
