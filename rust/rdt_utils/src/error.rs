// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use thiserror::Error;

/// Failures of the range-list and bitmask codecs.
///
/// All variants are recoverable by the caller. The only condition that is
/// not reported through this type is an out-of-range index passed to
/// [`crate::Bitmask::toggle`], which is a programming error and panics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("{what} {value} out of range, max {max}")]
    OutOfRange {
        what: &'static str,
        value: u64,
        max: u64,
    },
    #[error("bitmask has {actual} ways, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;
