//! Error handling for pedalchain
//!
//! Every error is raised synchronously at the call that violates the
//! processing contract. Nothing is retried internally.

use thiserror::Error;

/// Result type alias for pedalchain operations
pub type Result<T> = std::result::Result<T, PedalError>;

/// Broad classification of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong payload kind, wrong node kind, missing context
    Usage,
    /// Argument or shape rejected by a node or by the engine
    Validation,
    /// Processing or I/O failure
    Resource,
}

/// Main error type for pedalchain operations
#[derive(Error, Debug)]
pub enum PedalError {
    // Usage Errors
    #[error("{node} is an instrument and does not accept audio input; pass note events instead")]
    ExpectedNotes { node: String },

    #[error("{node} is an effect and does not accept note events; pass audio instead")]
    ExpectedAudio { node: String },

    #[error("Pedalboard only accepts effects, but {node} is an instrument")]
    InstrumentNotAllowed { node: String },

    #[error("No sample rate was provided and no default sample rate is configured")]
    MissingSampleRate,

    #[error("Cannot add {node} to {container}: the container would end up inside itself")]
    CyclicComposition { node: String, container: String },

    #[error("Index {index} is out of range for a container holding {len} nodes")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unknown node type: {name}")]
    UnknownNode { name: String },

    // Validation Errors
    #[error("{node} does not support {channels}-channel audio")]
    UnsupportedChannels { node: String, channels: usize },

    #[error("Invalid sample rate: {sample_rate} Hz")]
    InvalidSampleRate { sample_rate: f64 },

    #[error("Invalid buffer size: {buffer_size}")]
    InvalidBufferSize { buffer_size: usize },

    #[error(
        "{node} was asked to render {duration} seconds at {sample_rate} Hz; \
         did you swap the duration and sample_rate arguments?"
    )]
    SwappedArguments {
        node: String,
        duration: f64,
        sample_rate: f64,
    },

    #[error("Note event {index} has timestamp {timestamp}; timestamps must be finite, non-negative seconds")]
    InvalidTimestamp { index: usize, timestamp: f64 },

    #[error("Note event {index} at {timestamp}s comes before the previous event at {previous}s")]
    UnorderedEvents {
        index: usize,
        timestamp: f64,
        previous: f64,
    },

    #[error("Invalid parameter {param}: {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Audio shape mismatch: {details}")]
    ShapeMismatch { details: String },

    #[error("Node tree is nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },

    // Resource Errors
    #[error("Processing error: {reason}")]
    ProcessingError { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl PedalError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            PedalError::ExpectedNotes { .. } => "EXPECTED_NOTES",
            PedalError::ExpectedAudio { .. } => "EXPECTED_AUDIO",
            PedalError::InstrumentNotAllowed { .. } => "INSTRUMENT_NOT_ALLOWED",
            PedalError::MissingSampleRate => "MISSING_SAMPLE_RATE",
            PedalError::CyclicComposition { .. } => "CYCLIC_COMPOSITION",
            PedalError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            PedalError::UnknownNode { .. } => "UNKNOWN_NODE",
            PedalError::UnsupportedChannels { .. } => "UNSUPPORTED_CHANNELS",
            PedalError::InvalidSampleRate { .. } => "INVALID_SAMPLE_RATE",
            PedalError::InvalidBufferSize { .. } => "INVALID_BUFFER_SIZE",
            PedalError::SwappedArguments { .. } => "SWAPPED_ARGUMENTS",
            PedalError::InvalidTimestamp { .. } => "INVALID_TIMESTAMP",
            PedalError::UnorderedEvents { .. } => "UNORDERED_EVENTS",
            PedalError::InvalidParameter { .. } => "INVALID_PARAMETER",
            PedalError::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            PedalError::NestingTooDeep { .. } => "NESTING_TOO_DEEP",
            PedalError::ProcessingError { .. } => "PROCESSING_ERROR",
            PedalError::Io(_) => "IO_ERROR",
            PedalError::Serialization(_) => "SERIALIZATION_ERROR",
            PedalError::Wav(_) => "WAV_ERROR",
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PedalError::ExpectedNotes { .. }
            | PedalError::ExpectedAudio { .. }
            | PedalError::InstrumentNotAllowed { .. }
            | PedalError::MissingSampleRate
            | PedalError::CyclicComposition { .. }
            | PedalError::IndexOutOfRange { .. }
            | PedalError::UnknownNode { .. } => ErrorKind::Usage,
            PedalError::UnsupportedChannels { .. }
            | PedalError::InvalidSampleRate { .. }
            | PedalError::InvalidBufferSize { .. }
            | PedalError::SwappedArguments { .. }
            | PedalError::InvalidTimestamp { .. }
            | PedalError::UnorderedEvents { .. }
            | PedalError::InvalidParameter { .. }
            | PedalError::ShapeMismatch { .. }
            | PedalError::NestingTooDeep { .. } => ErrorKind::Validation,
            PedalError::ProcessingError { .. }
            | PedalError::Io(_)
            | PedalError::Serialization(_)
            | PedalError::Wav(_) => ErrorKind::Resource,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PedalError::ExpectedNotes { .. } => vec![
                "Call render() with note events instead of process()",
                "Instruments cannot be placed inside an audio chain",
            ],
            PedalError::ExpectedAudio { .. } => vec!["Call process() with an audio buffer"],
            PedalError::InstrumentNotAllowed { .. } => vec![
                "Render the instrument separately and feed its output to the pedalboard",
            ],
            PedalError::MissingSampleRate => vec![
                "Pass a sample rate to process()",
                "Set a default sample rate on the pedalboard",
            ],
            PedalError::UnsupportedChannels { .. } => vec![
                "Convert the audio to mono or stereo before processing",
            ],
            PedalError::SwappedArguments { .. } => vec![
                "The duration is in seconds and comes before the sample rate",
            ],
            PedalError::UnorderedEvents { .. } | PedalError::InvalidTimestamp { .. } => vec![
                "Sort note events by timestamp",
                "Timestamps are in seconds from the start of the render",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = PedalError::InstrumentNotAllowed {
            node: "SineSynth".to_string(),
        };
        assert_eq!(err.error_code(), "INSTRUMENT_NOT_ALLOWED");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_unsupported_channels_message() {
        let err = PedalError::UnsupportedChannels {
            node: "Reverb".to_string(),
            channels: 6,
        };
        assert!(err.to_string().contains("does not support"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_swapped_arguments_message() {
        let err = PedalError::SwappedArguments {
            node: "SineSynth".to_string(),
            duration: 44100.0,
            sample_rate: 2.0,
        };
        assert!(err.to_string().contains("swap"));
        assert!(!err.recovery_suggestions().is_empty());
    }
}
