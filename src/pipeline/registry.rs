/*!
 * Registries of filters and steps.
 *
 * Filters are keyed by config id (`okf_po`) and file extension; steps by the
 * keys used in the `pipeline.steps` configuration list.
 */

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::app_config::Config;
use crate::connectors::{MemoryTm, TmConnector};
use crate::errors::{PipelineError, PipelineResult};
use crate::filters::detector::NewlineType;
use crate::filters::plaintext::{self, PlainTextFilter};
use crate::filters::po::{self, PoFilter};
use crate::filters::{Filter, FilterWriter};
use crate::pipeline::engine::Pipeline;
use crate::pipeline::step::Step;
use crate::resource::model::RawDocument;
use crate::steps::{
    BomConversionStep, EventsWriterStep, LeverageStep, LineBreakConversionStep, LineSplicingStep,
    RawDocumentToEventsStep, SegmentationStep, SentenceSegmenter,
};

/// Builds a fresh filter.
pub type FilterFactory = fn() -> Box<dyn Filter>;

#[derive(Clone)]
struct FilterEntry {
    extensions: Vec<String>,
    factory: FilterFactory,
}

/// Filters by config id.
#[derive(Clone)]
pub struct FilterRegistry {
    entries: BTreeMap<String, FilterEntry>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterRegistry {
    /// Registry holding the built-in filters.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(po::FILTER_ID, &["po", "pot"], || Box::new(PoFilter::new()));
        registry.register(plaintext::FILTER_ID, &["txt"], || Box::new(PlainTextFilter::new()));
        registry
    }

    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register a filter. Extensions are matched without case or leading dot.
    pub fn register(&mut self, id: &str, extensions: &[&str], factory: FilterFactory) {
        let extensions = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        self.entries.insert(id.to_string(), FilterEntry { extensions, factory });
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Every registered extension, sorted
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self
            .entries
            .values()
            .flat_map(|entry| entry.extensions.iter().map(String::as_str))
            .collect();
        extensions.sort_unstable();
        extensions.dedup();
        extensions
    }

    /// Whether some filter handles this file extension
    pub fn supports_extension(&self, extension: &str) -> bool {
        self.id_for_extension(extension).is_some()
    }

    pub fn id_for_extension(&self, extension: &str) -> Option<&str> {
        let extension = extension.trim_start_matches('.').to_lowercase();
        self.entries
            .iter()
            .find(|(_, entry)| entry.extensions.contains(&extension))
            .map(|(id, _)| id.as_str())
    }

    /// Filter id for a raw document: its own filter id, or the one of its extension.
    pub fn id_for(&self, raw: &RawDocument) -> PipelineResult<String> {
        if let Some(id) = &raw.filter_config_id {
            return Ok(id.clone());
        }
        raw.extension()
            .and_then(|e| self.id_for_extension(&e))
            .map(str::to_string)
            .ok_or_else(|| PipelineError::BadStepInput(format!("No filter for '{}'", raw.name)))
    }

    pub fn create(&self, id: &str) -> PipelineResult<Box<dyn Filter>> {
        self.entries
            .get(id)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| PipelineError::UnknownComponent(format!("filter '{}'", id)))
    }

    /// Writer of the given filter.
    pub fn create_writer(&self, id: &str) -> PipelineResult<Box<dyn FilterWriter>> {
        Ok(self.create(id)?.create_filter_writer())
    }
}

/// Builds a step from the configuration.
pub type StepFactory = Arc<dyn Fn(&Config, &FilterRegistry) -> PipelineResult<Box<dyn Step>> + Send + Sync>;

/// Steps by configuration key.
#[derive(Clone)]
pub struct StepRegistry {
    factories: BTreeMap<String, StepFactory>,
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StepRegistry {
    /// Registry holding the built-in steps.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register("raw-to-events", |_, filters| {
            Ok(Box::new(RawDocumentToEventsStep::new(filters.clone())))
        });
        registry.register("events-writer", |config, filters| {
            Ok(Box::new(EventsWriterStep::new(filters.clone()).with_output_encoding(config.output_encoding.clone())))
        });
        registry.register("segmentation", |config, _| {
            let segmenter = SentenceSegmenter::new(&config.segmentation.terminators)
                .map_err(|e| PipelineError::BadStepInput(format!("segmentation rules: {}", e)))?;
            Ok(Box::new(
                SegmentationStep::new(Box::new(segmenter)).with_targets(config.segmentation.segment_targets),
            ))
        });
        registry.register("leverage", |config, _| {
            let connector: Box<dyn TmConnector> = match &config.leverage.tm_path {
                Some(path) => Box::new(MemoryTm::from_file(path)),
                None => Box::new(MemoryTm::new("memory")),
            };
            Ok(Box::new(LeverageStep::new(connector, config.leverage.clone())))
        });
        registry.register("splice-lines", |config, _| {
            Ok(Box::new(LineSplicingStep::new(
                &config.splice.splicer,
                config.splice.create_placeholders,
            )))
        });
        registry.register("linebreak-conversion", |config, _| {
            let line_break = NewlineType::from_name(&config.linebreak.line_break).ok_or_else(|| {
                PipelineError::BadStepInput(format!("line break '{}'", config.linebreak.line_break))
            })?;
            Ok(Box::new(LineBreakConversionStep::new(line_break)))
        });
        registry.register("bom-conversion", |config, _| {
            Ok(Box::new(BomConversionStep::new(config.bom.remove, config.bom.also_non_utf8)))
        });
        registry
    }

    pub fn register<F>(&mut self, key: &str, factory: F)
    where
        F: Fn(&Config, &FilterRegistry) -> PipelineResult<Box<dyn Step>> + Send + Sync + 'static,
    {
        self.factories.insert(key.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create(&self, key: &str, config: &Config, filters: &FilterRegistry) -> PipelineResult<Box<dyn Step>> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| PipelineError::UnknownComponent(format!("step '{}'", key)))?;
        factory(config, filters)
    }

    /// Build the pipeline listed in `config.pipeline.steps`.
    pub fn build_pipeline(&self, config: &Config, filters: &FilterRegistry) -> PipelineResult<Pipeline> {
        let mut pipeline = Pipeline::new();
        for key in &config.pipeline.steps {
            debug!("Building step '{}'", key);
            pipeline.add_step(self.create(key, config, filters)?);
        }
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::LocaleId;

    #[test]
    fn test_filterRegistry_extension_shouldSelectFilter() {
        let registry = FilterRegistry::new();

        assert_eq!(registry.id_for_extension(".PO"), Some("okf_po"));
        assert_eq!(registry.id_for_extension("txt"), Some("okf_plaintext"));
        assert!(!registry.supports_extension("docx"));
        assert_eq!(registry.extensions(), vec!["po", "pot", "txt"]);

        let raw = RawDocument::from_text("x.pot", "", LocaleId::new("en").unwrap());
        assert_eq!(registry.id_for(&raw).unwrap(), "okf_po");
        let forced = raw.with_filter("okf_plaintext");
        assert_eq!(registry.id_for(&forced).unwrap(), "okf_plaintext");
    }

    #[test]
    fn test_filterRegistry_unknownId_shouldBeUnknownComponent() {
        let result = FilterRegistry::new().create("okf_html");
        assert!(matches!(result, Err(PipelineError::UnknownComponent(_))));
    }

    #[test]
    fn test_stepRegistry_buildPipeline_shouldFollowConfigOrder() {
        let mut config = Config::default();
        config.pipeline.steps = vec![
            "bom-conversion".to_string(),
            "raw-to-events".to_string(),
            "segmentation".to_string(),
            "splice-lines".to_string(),
            "events-writer".to_string(),
        ];
        let pipeline = StepRegistry::new().build_pipeline(&config, &FilterRegistry::new()).unwrap();

        assert_eq!(pipeline.step_names(), config.pipeline.steps);
    }

    #[test]
    fn test_stepRegistry_unknownKey_shouldFail() {
        let result = StepRegistry::new().create("nope", &Config::default(), &FilterRegistry::new());
        assert!(matches!(result, Err(PipelineError::UnknownComponent(_))));
    }
}
