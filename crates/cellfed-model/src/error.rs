//! Error types for the cellfed-model crate.

/// Errors that can occur while encoding, decoding, or combining parameters.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The wire string was not valid base64.
    #[error("invalid base64 parameter payload: {source}")]
    Base64 {
        /// The underlying decode error.
        #[from]
        source: base64::DecodeError,
    },

    /// The decoded bytes did not describe a parameter set.
    #[error("invalid parameter encoding: {source}")]
    Encoding {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// Two parameter sets do not share the same tensor names and shapes.
    #[error("incompatible parameters: {reason}")]
    Incompatible {
        /// Which tensor differs and how.
        reason: String,
    },

    /// The sample counts being averaged do not fit in a `u64`.
    #[error("total sample count overflows u64")]
    SampleOverflow,

    /// A weighted combination was requested over nothing, or with weights
    /// that do not sum to a positive value.
    #[error("cannot combine parameters: {reason}")]
    EmptyCombination {
        /// Why the combination is undefined.
        reason: &'static str,
    },
}
