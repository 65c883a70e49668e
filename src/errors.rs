/*!
 * Error types for the textskel library.
 *
 * This module contains custom error types for the different layers of the
 * framework (resource model, filters, pipeline), using the thiserror crate
 * for ergonomic error definitions.
 */

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the resource model (coded text, containers, skeletons)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A range does not fit the coded text it is applied to
    #[error("Invalid range {start}..{end} for coded text of length {len}")]
    InvalidRange {
        /// Start position (coded-text units)
        start: usize,
        /// End position (coded-text units)
        end: usize,
        /// Length of the coded text
        len: usize,
    },

    /// A marker in the coded text points outside the code list
    #[error("Marker at position {position} refers to missing code index {index}")]
    InvalidCodeIndex {
        /// Position of the marker in the coded text
        position: usize,
        /// Index carried by the marker
        index: usize,
    },

    /// Source and target segment lists cannot be aligned
    #[error("Misaligned segments in '{resource_id}': source has {source_count}, target has {target_count}")]
    Misalignment {
        /// Text unit whose segments do not match
        resource_id: String,
        /// Number of source segments
        source_count: usize,
        /// Number of target segments
        target_count: usize,
    },

    /// A code storage string could not be parsed back
    #[error("Invalid code storage: {0}")]
    InvalidStorage(String),

    /// An id generator was created with an empty root
    #[error("The root of an id generator must not be empty")]
    EmptyIdRoot,

    /// A locale identifier does not name a known language
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),
}

/// Errors raised by format filters and raw-document handling
#[derive(Error, Debug)]
pub enum FilterError {
    /// The input cannot be parsed by the filter
    #[error("Malformed input in {document} at line {line}: {message}")]
    MalformedInput {
        /// Document being parsed
        document: String,
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// The declared or detected encoding is not supported
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// The filter was used before `open` or after `close`
    #[error("Filter is not open")]
    NotOpen,

    /// The filter needs a target locale and the document has none
    #[error("No target locale set for {0}")]
    MissingTargetLocale(String),

    /// Error from an underlying I/O operation
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while executing a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step or filter broke the event nesting grammar
    #[error("Event contract violation: expected {expected}, found {found}")]
    ContractViolation {
        /// What the grammar allowed at that point
        expected: String,
        /// The event type that was received
        found: String,
    },

    /// Error from a filter
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// Error from the resource model
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// The writer could not produce its output
    #[error("Cannot write output {path:?}: {message}")]
    IoFailure {
        /// Output path
        path: PathBuf,
        /// Underlying error message
        message: String,
    },

    /// The batch was canceled by the host
    #[error("Processing canceled")]
    Canceled,

    /// A registry key does not match any known component
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// A step received an input it cannot work with
    #[error("Bad step input: {0}")]
    BadStepInput(String),

    /// Error from a translation memory connector
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),
}

/// Errors raised by translation memory connectors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// The resource could not be opened or read
    #[error("Cannot open translation memory {0}")]
    Unavailable(String),

    /// The query failed but may succeed if tried again
    #[error("Retryable query failure: {0}")]
    Retryable(String),

    /// The query failed and will keep failing
    #[error("Query failure: {0}")]
    Fatal(String),

    /// A query was sent before the languages were set
    #[error("Languages not set")]
    LanguagesNotSet,
}

impl PipelineError {
    /// Whether this error must stop the whole batch rather than just one item.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ContractViolation { .. }
                | PipelineError::Canceled
                | PipelineError::UnknownComponent(_)
        )
    }

    /// Whether this error only stops the current item.
    pub fn is_item_fatal(&self) -> bool {
        !self.is_batch_fatal()
    }
}

/// A failure attached to one batch item, for per-item reporting
#[derive(Error, Debug)]
pub struct ItemFailure {
    /// Path or name of the document being processed
    pub document: String,
    /// Last resource that left the pipeline before the failure, if any
    pub resource_id: Option<String>,
    /// The underlying error
    #[source]
    pub error: PipelineError,
}

impl ItemFailure {
    /// Attach a document name to a pipeline error
    pub fn new(document: &str, error: PipelineError) -> Self {
        Self {
            document: document.to_string(),
            resource_id: None,
            error,
        }
    }

    /// Record the resource that was being processed
    pub fn with_resource(mut self, resource_id: &str) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.document)?;
        if let Some(ref id) = self.resource_id {
            write!(f, " [{}]", id)?;
        }
        write!(f, ": {}", self.error)
    }
}

/// Convenience result type for pipeline operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipelineError_isBatchFatal_shouldClassifyPolicy() {
        let violation = PipelineError::ContractViolation {
            expected: "START_DOCUMENT".to_string(),
            found: "TEXT_UNIT".to_string(),
        };
        assert!(violation.is_batch_fatal());
        assert!(PipelineError::Canceled.is_batch_fatal());

        let malformed = PipelineError::Filter(FilterError::MalformedInput {
            document: "a.po".to_string(),
            line: 3,
            message: "unterminated string".to_string(),
        });
        assert!(!malformed.is_batch_fatal());
    }

    #[test]
    fn test_itemFailure_display_shouldIncludeDocumentAndResource() {
        let failure = ItemFailure::new("docs/a.po", PipelineError::Canceled).with_resource("tu3");
        let display = format!("{}", failure);
        assert!(display.contains("docs/a.po"));
        assert!(display.contains("[tu3]"));
        assert!(display.contains("canceled"));
    }
}
