//! The payload module decodes the payloads of validated device frames into
//! typed responses.

pub mod body_composition;
pub mod response;

pub use body_composition::{
    decode_algorithm, AlgorithmError, AlgorithmResult, BodyCompositionRecord, BodyType, Metric,
};
pub use response::*;
