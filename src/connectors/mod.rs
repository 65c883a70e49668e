/*!
 * Translation memory connectors.
 *
 * Leverage only relies on the query interface below and on the ranking of
 * results (`MatchType` first, then score, then creation date). How a
 * connector scores its matches is its own business.
 */

pub mod fuzzy;
pub mod memory_tm;

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ConnectorError;
use crate::locale::LocaleId;
use crate::resource::fragment::TextFragment;

pub use memory_tm::{MemoryTm, TmEntry};

/// Kind of match, from the most to the least reliable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactUniqueId,
    ExactPreviousVersion,
    ExactLocalContext,
    Exact,
    /// Same text, different inline codes
    ExactTextOnly,
    FuzzyUniqueId,
    FuzzyPreviousVersion,
    FuzzyExactText,
    Fuzzy,
    PhraseAssembled,
    Mt,
    Concordance,
    Unknown,
}

impl MatchType {
    /// Position in the ranking; lower is better.
    pub fn rank(self) -> u8 {
        match self {
            MatchType::ExactUniqueId => 0,
            MatchType::ExactPreviousVersion => 1,
            MatchType::ExactLocalContext => 2,
            MatchType::Exact => 3,
            MatchType::ExactTextOnly => 4,
            MatchType::FuzzyUniqueId => 5,
            MatchType::FuzzyPreviousVersion => 6,
            MatchType::FuzzyExactText => 7,
            MatchType::Fuzzy => 8,
            MatchType::PhraseAssembled => 9,
            MatchType::Mt => 10,
            MatchType::Concordance => 11,
            MatchType::Unknown => 12,
        }
    }

    pub fn is_exact(self) -> bool {
        self.rank() <= MatchType::ExactTextOnly.rank()
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchType::ExactUniqueId => "EXACT_UNIQUE_ID",
            MatchType::ExactPreviousVersion => "EXACT_PREVIOUS_VERSION",
            MatchType::ExactLocalContext => "EXACT_LOCAL_CONTEXT",
            MatchType::Exact => "EXACT",
            MatchType::ExactTextOnly => "EXACT_TEXT_ONLY",
            MatchType::FuzzyUniqueId => "FUZZY_UNIQUE_ID",
            MatchType::FuzzyPreviousVersion => "FUZZY_PREVIOUS_VERSION",
            MatchType::FuzzyExactText => "FUZZY_EXACT_TEXT",
            MatchType::Fuzzy => "FUZZY",
            MatchType::PhraseAssembled => "PHRASE_ASSEMBLED",
            MatchType::Mt => "MT",
            MatchType::Concordance => "CONCORDANCE",
            MatchType::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// One hit returned by a connector.
///
/// Results sort best first: by match type, then by score (highest first),
/// then by creation date (newest first, undated last).
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub source: TextFragment,
    pub target: TextFragment,
    /// Similarity, 0 to 100
    pub score: u8,
    pub match_type: MatchType,
    /// Name of the connector that produced the hit
    pub origin: String,
    pub creation_date: Option<DateTime<Utc>>,
}

impl Ord for QueryResult {
    fn cmp(&self, other: &Self) -> Ordering {
        self.match_type
            .rank()
            .cmp(&other.match_type.rank())
            .then_with(|| other.score.cmp(&self.score))
            .then_with(|| match (self.creation_date, other.creation_date) {
                (Some(a), Some(b)) => b.cmp(&a),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}

impl PartialOrd for QueryResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueryResult {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueryResult {}

/// A translation memory or machine translation resource.
pub trait TmConnector: Send {
    /// Name reported as the origin of the results
    fn name(&self) -> &str;

    /// Open the resource.
    fn open(&mut self) -> Result<(), ConnectorError>;

    /// Set the language pair of the next queries.
    fn set_languages(&mut self, source: &LocaleId, target: &LocaleId);

    /// Minimum score of the results, 0 to 100.
    fn set_threshold(&mut self, threshold: u8);

    /// Maximum number of results per query.
    fn set_max_hits(&mut self, max_hits: usize);

    /// Run a query; the results are read with `next`.
    ///
    /// # Returns
    /// * The number of results found
    fn query(&mut self, text: &TextFragment) -> Result<usize, ConnectorError>;

    fn has_next(&self) -> bool;

    /// Next result of the last query, best first.
    fn next(&mut self) -> Option<QueryResult>;

    fn close(&mut self);
}
