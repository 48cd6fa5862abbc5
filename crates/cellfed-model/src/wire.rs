//! Wire encoding of parameter sets: [`ModelParameters::store`] bytes in
//! standard base64, so they travel as a JSON string.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::ModelError;
use crate::params::ModelParameters;

/// Encode parameters for a JSON payload.
pub fn encode_wire<P: ModelParameters>(params: &P) -> Result<String, ModelError> {
    Ok(STANDARD.encode(params.store()?))
}

/// Decode parameters from a JSON payload string.
pub fn decode_wire<P: ModelParameters>(encoded: &str) -> Result<P, ModelError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    P::load(&bytes)
}
