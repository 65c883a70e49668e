/*!
 * In-memory translation memory.
 *
 * Entries are plain text pairs, loaded from a JSON file or added in code.
 * Clones share the same storage and counters.
 */

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::connectors::{MatchType, QueryResult, TmConnector, fuzzy};
use crate::errors::ConnectorError;
use crate::locale::LocaleId;
use crate::resource::fragment::TextFragment;

/// One translation pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmEntry {
    pub source_locale: LocaleId,
    pub target_locale: LocaleId,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
}

impl TmEntry {
    pub fn new(source_locale: &LocaleId, target_locale: &LocaleId, source: &str, target: &str) -> Self {
        Self {
            source_locale: source_locale.clone(),
            target_locale: target_locale.clone(),
            source: source.to_string(),
            target: target.to_string(),
            creation_date: None,
        }
    }
}

/// Translation memory held in memory
#[derive(Debug, Clone)]
pub struct MemoryTm {
    name: String,
    path: Option<PathBuf>,
    entries: Arc<RwLock<Vec<TmEntry>>>,
    hits: Arc<RwLock<usize>>,
    misses: Arc<RwLock<usize>>,
    languages: Option<(LocaleId, LocaleId)>,
    threshold: u8,
    max_hits: usize,
    results: VecDeque<QueryResult>,
}

impl MemoryTm {
    /// Create an empty memory
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: None,
            entries: Arc::new(RwLock::new(Vec::new())),
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
            languages: None,
            threshold: 75,
            max_hits: 5,
            results: VecDeque::new(),
        }
    }

    /// Memory loaded from a JSON array of entries when opened
    pub fn from_file(path: &Path) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "memory".to_string());
        let mut tm = Self::new(&name);
        tm.path = Some(path.to_path_buf());
        tm
    }

    /// Store a translation pair
    pub fn add(&self, entry: TmEntry) {
        debug!("Storing TM entry '{}' ({} -> {})", truncate_text(&entry.source, 30), entry.source_locale, entry.target_locale);
        self.entries.write().push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Query statistics: hits, misses and hit rate
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = *self.hits.read();
        let misses = *self.misses.read();
        let total = hits + misses;
        let hit_rate = if total > 0 { hits as f64 / total as f64 } else { 0.0 };
        (hits, misses, hit_rate)
    }

    fn score(&self, text: &str, has_codes: bool, entry: &TmEntry) -> Option<(u8, MatchType)> {
        if entry.source == text {
            let match_type = if has_codes { MatchType::ExactTextOnly } else { MatchType::Exact };
            return Some((100, match_type));
        }
        fuzzy::similarity_at_least(text, &entry.source, self.threshold).map(|score| (score, MatchType::Fuzzy))
    }
}

impl TmConnector for MemoryTm {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), ConnectorError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = fs::read_to_string(path)
            .map_err(|e| ConnectorError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let entries: Vec<TmEntry> = serde_json::from_str(&content)
            .map_err(|e| ConnectorError::Unavailable(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded {} TM entries from {}", entries.len(), path.display());
        *self.entries.write() = entries;
        Ok(())
    }

    fn set_languages(&mut self, source: &LocaleId, target: &LocaleId) {
        self.languages = Some((source.clone(), target.clone()));
    }

    fn set_threshold(&mut self, threshold: u8) {
        self.threshold = threshold.min(100);
    }

    fn set_max_hits(&mut self, max_hits: usize) {
        self.max_hits = max_hits.max(1);
    }

    fn query(&mut self, text: &TextFragment) -> Result<usize, ConnectorError> {
        let (source_locale, target_locale) = self.languages.clone().ok_or(ConnectorError::LanguagesNotSet)?;
        self.results.clear();

        let plain = text.to_display_text();
        if plain.trim().is_empty() {
            return Ok(0);
        }

        let mut results: Vec<QueryResult> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|e| e.source_locale == source_locale && e.target_locale == target_locale)
                .filter_map(|e| {
                    self.score(&plain, text.has_code(), e).map(|(score, match_type)| QueryResult {
                        source: TextFragment::from_text(&e.source),
                        target: TextFragment::from_text(&e.target),
                        score,
                        match_type,
                        origin: self.name.clone(),
                        creation_date: e.creation_date,
                    })
                })
                .collect()
        };
        results.sort();
        results.truncate(self.max_hits);

        if results.is_empty() {
            *self.misses.write() += 1;
        } else {
            *self.hits.write() += 1;
        }
        debug!("TM query '{}' gave {} result(s)", truncate_text(&plain, 30), results.len());

        self.results = results.into();
        Ok(self.results.len())
    }

    fn has_next(&self) -> bool {
        !self.results.is_empty()
    }

    fn next(&mut self) -> Option<QueryResult> {
        self.results.pop_front()
    }

    fn close(&mut self) {
        self.results.clear();
    }
}

/// Truncate text to a maximum number of characters with ellipsis
fn truncate_text(text: &str, max_length: usize) -> String {
    match text.char_indices().nth(max_length) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
