//! Shared value types for the glide swipe decoder.

pub mod error;
pub mod types;

pub use error::DecodeError;
pub use types::{
    Decoded, Diagnostics, LexiconData, PathPoint, Point, Prediction, RawPoint, WordInfo,
};
