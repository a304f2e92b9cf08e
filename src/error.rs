//! Error types for the flow-layout core

use thiserror::Error;

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("stability weight must be finite and non-negative, got {0}")]
    InvalidStabilityWeight(f64),

    #[error("{0} must be at least 1")]
    ZeroCount(&'static str),
}

/// Failures raised while ordering communities within their slices.
///
/// None of these are fatal to the pipeline: the assembler falls back to the
/// unoptimized order and reports the error as a warning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderingError {
    #[error("block at time {0} lies outside the slice timeline")]
    UnknownSlice(String),

    #[error("community {community} appears more than once at time {time}")]
    DuplicateBlock { time: String, community: String },

    #[error("transition curve endpoint {community} at time {time} has no block")]
    UnknownEndpoint { time: String, community: String },

    #[error("transition curve from {source_time} to {target_time} does not join adjacent slices")]
    NonAdjacentCurve {
        source_time: String,
        target_time: String,
    },

    #[error("ordering objective evaluated to a non-finite score")]
    NonFiniteScore,
}
