//! Error taxonomy for the picking engine
use time::OffsetDateTime;

/// Input or state that cannot be accepted
///
/// These are fatal for the operation that raised them, and only for that
/// operation: no pick line or tide curve is left partially mutated.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A tide file row could not be read
    #[error("malformed tide record at row {row}: {reason}")]
    MalformedTide {
        /// One-based row in the tide file
        row: usize,
        /// What was wrong with it
        reason: String,
    },
    /// Tide timestamps must be strictly increasing
    #[error("tide timestamps not strictly increasing at row {row}")]
    NonMonotonicTide {
        /// One-based row of the offending record
        row: usize,
    },
    /// A tide curve needs at least one record
    #[error("tide curve is empty")]
    EmptyTide,
    /// A pick line does not have one sample per trace
    #[error("pick line {key} has {found} samples but the survey line has {expected} traces")]
    Misaligned {
        /// The pick line
        key: String,
        /// Trace count of the survey line
        expected: usize,
        /// Sample count supplied
        found: usize,
    },
    /// An edit range falls outside the pick line
    #[error("range {start}..{end} is outside pick line {key} of length {len}")]
    RangeOutOfBounds {
        /// The pick line
        key: String,
        /// Start of the range (inclusive)
        start: usize,
        /// End of the range (exclusive)
        end: usize,
        /// Length of the pick line
        len: usize,
    },
    /// The samples supplied for an edit do not fill its range
    #[error("{found} samples supplied for a range of {expected} traces")]
    SampleCount {
        /// Length of the range
        expected: usize,
        /// Number of samples supplied
        found: usize,
    },
    /// Picked depths must be finite numbers
    #[error("depth at trace {index} is not a finite number")]
    NonFiniteDepth {
        /// Trace index of the offending depth
        index: usize,
    },
    /// The pick line is locked against edits
    #[error("pick line {0} is locked")]
    Locked(String),
    /// No pick line exists for the key
    #[error("no pick line {0}")]
    UnknownPickLine(String),
    /// No survey line with that name
    #[error("no survey line named {0}")]
    UnknownLine(String),
    /// A pick type name could not be parsed
    #[error("unknown pick type {0:?}")]
    UnknownPickType(String),
    /// A provenance tag could not be parsed
    #[error("unknown sample source {0:?}")]
    UnknownSource(String),
    /// Trace indices within a channel must run 0..n without holes
    #[error("line {line} channel {frequency} kHz: expected trace {expected}, found {found}")]
    NonContiguous {
        /// Survey line
        line: String,
        /// Channel frequency in kHz
        frequency: u32,
        /// Expected trace index
        expected: usize,
        /// Trace index found
        found: usize,
    },
    /// All channels of a line must hold the same number of traces
    #[error("line {line} channel {frequency} kHz has {found} traces, expected {expected}")]
    ChannelLength {
        /// Survey line
        line: String,
        /// Channel frequency in kHz
        frequency: u32,
        /// Trace count of the first channel
        expected: usize,
        /// Trace count of this channel
        found: usize,
    },
    /// A stored record did not have the expected shape
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    /// The pick type is not part of the survey configuration
    #[error("pick type {0} is not configured for this survey")]
    PickTypeNotConfigured(String),
    /// Correction needs a tide curve and the project has none
    #[error("no tide curve in project {0}")]
    NoTide(String),
    /// Export delimiters must be single-byte characters
    #[error("export delimiter {0:?} is not a single-byte character")]
    Delimiter(char),
}

/// A timestamp outside the coverage of a tide curve
///
/// Recoverable: the caller treats the trace as having no correction.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("timestamp {timestamp} outside tide coverage {start}..={end}")]
pub struct RangeError {
    /// The requested timestamp
    pub timestamp: OffsetDateTime,
    /// First timestamp of the curve
    pub start: OffsetDateTime,
    /// Last timestamp of the curve
    pub end: OffsetDateTime,
}

/// A tide gauge retrieval failed
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("fetching gauge {gauge}: {reason}")]
pub struct FetchError {
    /// The gauge identifier
    pub gauge: String,
    /// Reason reported by the collaborator
    pub reason: String,
}

/// Errors returned by the crate
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid input or state
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Timestamp outside tide coverage
    #[error(transparent)]
    Range(#[from] RangeError),
    /// Gauge retrieval failure
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Avro encoding or decoding failure
    #[error("avro error: {0}")]
    Avro(#[from] apache_avro::Error),
    /// Delimited text failure
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// Configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
