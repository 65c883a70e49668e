/*!
 * Leverage step: fills empty target segments from a translation memory.
 *
 * Each source segment with text is queried on its own. Existing target
 * content is never replaced, and a unit whose target segmentation does not
 * match its source is skipped with a warning.
 */

use log::{debug, info, warn};

use crate::app_config::LeverageConfig;
use crate::connectors::{QueryResult, TmConnector};
use crate::errors::{ConnectorError, PipelineResult, ResourceError};
use crate::event::Event;
use crate::locale::LocaleId;
use crate::pipeline::step::{Flow, Step};
use crate::resource::fragment::TextFragment;
use crate::resource::model::{Resource, TextUnit};

pub const SCORE_ANNOTATION: &str = "leverage.score";
pub const MATCH_TYPE_ANNOTATION: &str = "leverage.match_type";
pub const ORIGIN_ANNOTATION: &str = "leverage.origin";

pub struct LeverageStep {
    connector: Box<dyn TmConnector>,
    config: LeverageConfig,
    source_locale: Option<LocaleId>,
    target_locale: Option<LocaleId>,
    opened: bool,
    leveraged: usize,
}

impl LeverageStep {
    pub fn new(connector: Box<dyn TmConnector>, config: LeverageConfig) -> Self {
        Self {
            connector,
            config,
            source_locale: None,
            target_locale: None,
            opened: false,
            leveraged: 0,
        }
    }

    /// Target locale used when batch items do not set one
    pub fn with_target_locale(mut self, locale: LocaleId) -> Self {
        self.target_locale = Some(locale);
        self
    }

    fn update_languages(&mut self) {
        if let (Some(source), Some(target)) = (&self.source_locale, &self.target_locale) {
            debug!("Leverage languages: {} -> {}", source, target);
            self.connector.set_languages(source, target);
        }
    }

    fn release(&mut self) {
        if self.opened {
            self.connector.close();
            self.opened = false;
        }
    }

    /// Best hit for one segment, retrying retryable connector failures.
    fn best_match(&mut self, text: &TextFragment) -> PipelineResult<Option<QueryResult>> {
        let mut attempts = 0;
        loop {
            match self.connector.query(text) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(self.connector.next()),
                Err(ConnectorError::Retryable(message)) if attempts < self.config.retry_count => {
                    attempts += 1;
                    warn!("TM query failed ({}), retry {}/{}", message, attempts, self.config.retry_count);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn leverage_unit(&mut self, tu: &mut TextUnit, locale: &LocaleId) -> PipelineResult<()> {
        let mut target = match tu.target(locale) {
            Some(existing) => {
                let source_count = tu.source().segment_count();
                let target_count = existing.segment_count();
                if source_count != target_count {
                    let error = ResourceError::Misalignment {
                        resource_id: tu.id.clone(),
                        source_count,
                        target_count,
                    };
                    warn!("Skipping leverage: {}", error);
                    return Ok(());
                }
                existing.clone()
            }
            None => tu.source().empty_like(),
        };

        let sources: Vec<TextFragment> = tu.source().segments().into_iter().cloned().collect();
        let mut best: Option<QueryResult> = None;
        let mut changed = false;
        for (source, slot) in sources.iter().zip(target.segments_mut()) {
            if !slot.is_empty() || !source.has_text(false) {
                continue;
            }
            match self.best_match(source)? {
                Some(hit) => {
                    if self.config.fill_target {
                        *slot = adapt_target(source, &hit.target);
                        changed = true;
                    }
                    if best.as_ref().is_none_or(|b| hit < *b) {
                        best = Some(hit);
                    }
                }
                None if self.config.copy_source_on_miss => {
                    *slot = source.clone();
                    changed = true;
                }
                None => {}
            }
        }

        if let Some(hit) = best {
            debug!("Unit '{}': {} match ({}) from {}", tu.id, hit.match_type, hit.score, hit.origin);
            tu.annotations.set(SCORE_ANNOTATION, i64::from(hit.score));
            tu.annotations.set(MATCH_TYPE_ANNOTATION, hit.match_type.to_string());
            tu.annotations.set(ORIGIN_ANNOTATION, hit.origin);
            self.leveraged += 1;
        }
        if changed {
            tu.set_target(locale, target);
        }
        Ok(())
    }
}

/// Target text of a hit, keeping the inline codes of the source when the
/// memory only holds plain text.
fn adapt_target(source: &TextFragment, target: &TextFragment) -> TextFragment {
    let mut adapted = target.clone();
    if source.has_code() && !target.has_code() {
        for code in source.codes() {
            adapted.append(code.clone());
        }
    }
    adapted
}

impl Step for LeverageStep {
    fn name(&self) -> &str {
        "leverage"
    }

    fn destroy(&mut self) {
        self.release();
    }

    fn handle_start_batch(&mut self, event: Event) -> PipelineResult<Flow> {
        self.release();
        self.connector.open()?;
        self.connector.set_threshold(self.config.threshold);
        self.connector.set_max_hits(self.config.max_hits);
        self.opened = true;
        self.leveraged = 0;
        info!("Leveraging from '{}' (threshold {})", self.connector.name(), self.config.threshold);
        Ok(Flow::Produced(event))
    }

    fn handle_end_batch(&mut self, event: Event) -> PipelineResult<Flow> {
        info!("Leveraged {} unit(s) from '{}'", self.leveraged, self.connector.name());
        self.release();
        Ok(Flow::Produced(event))
    }

    fn handle_start_batch_item(&mut self, event: Event) -> PipelineResult<Flow> {
        if let Resource::BatchItem(context) = &event.resource {
            if let Some(locale) = &context.target_locale {
                self.target_locale = Some(locale.clone());
            }
        }
        Ok(Flow::Produced(event))
    }

    fn handle_start_document(&mut self, event: Event) -> PipelineResult<Flow> {
        if let Some(start) = event.as_start_document() {
            self.source_locale = Some(start.locale.clone());
            self.update_languages();
        }
        Ok(Flow::Produced(event))
    }

    fn handle_text_unit(&mut self, mut event: Event) -> PipelineResult<Flow> {
        let Some(locale) = self.target_locale.clone() else {
            return Ok(Flow::Produced(event));
        };
        if let Some(tu) = event.as_text_unit_mut() {
            if tu.is_translatable() {
                self.leverage_unit(tu, &locale)?;
            }
        }
        Ok(Flow::Produced(event))
    }
}
