//! Opaque model parameters and federated averaging.
//!
//! The coordinator never looks inside a model. It only needs to copy a
//! parameter set, move it over the wire, check that two sets have the same
//! shape, and form a weighted sum. [`ModelParameters`] captures exactly
//! that, and [`federated_average`] builds FedAvg on top of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A parameter set the coordinator can store, ship, and average.
pub trait ModelParameters: Clone + Send + Sync + 'static {
    /// Serialize to bytes.
    fn store(&self) -> Result<Vec<u8>, ModelError>;

    /// Deserialize from bytes produced by [`Self::store`].
    fn load(bytes: &[u8]) -> Result<Self, ModelError>;

    /// Whether `other` has the same layout as `self`.
    fn is_compatible(&self, other: &Self) -> bool;

    /// `Σ params_i · weight_i` over compatible parameter sets.
    fn weighted_combine(parts: &[(&Self, f64)]) -> Result<Self, ModelError>;
}

/// FedAvg: weight each parameter set by its share of the total sample
/// count.
///
/// Fails when there are no updates, when the total sample count is zero,
/// or when it does not fit in a `u64`.
pub fn federated_average<P: ModelParameters>(updates: &[(&P, u64)]) -> Result<P, ModelError> {
    let total = updates
        .iter()
        .try_fold(0_u64, |acc, (_, n)| acc.checked_add(*n))
        .ok_or(ModelError::SampleOverflow)?;
    if total == 0 {
        return Err(ModelError::EmptyCombination {
            reason: "total sample count is zero",
        });
    }

    #[allow(clippy::cast_precision_loss)]
    let parts: Vec<(&P, f64)> = updates
        .iter()
        .map(|(params, n)| (*params, *n as f64 / total as f64))
        .collect();
    P::weighted_combine(&parts)
}

/// Named flat tensors, the parameter format of every model in the
/// workspace.
///
/// Stored as JSON; names are kept sorted so two blobs with the same
/// layout always serialize their tensors in the same order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBlob {
    tensors: BTreeMap<String, Vec<f32>>,
}

impl ParameterBlob {
    /// Create an empty blob.
    pub const fn new() -> Self {
        Self {
            tensors: BTreeMap::new(),
        }
    }

    /// Insert or replace a tensor.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f32>) {
        self.tensors.insert(name.into(), values);
    }

    /// Look up a tensor by name.
    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.tensors.get(name).map(Vec::as_slice)
    }

    /// Tensor names with their lengths.
    pub fn shapes(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v.len()))
    }

    /// Total number of scalar parameters.
    pub fn len(&self) -> usize {
        self.tensors.values().map(Vec::len).sum()
    }

    /// Whether the blob holds no scalars at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn layout_mismatch(&self, other: &Self) -> Option<String> {
        if self.tensors.len() != other.tensors.len() {
            return Some(format!(
                "expected {} tensors, found {}",
                self.tensors.len(),
                other.tensors.len()
            ));
        }
        for (name, values) in &self.tensors {
            match other.tensors.get(name) {
                None => return Some(format!("missing tensor `{name}`")),
                Some(theirs) if theirs.len() != values.len() => {
                    return Some(format!(
                        "tensor `{name}` has {} values, expected {}",
                        theirs.len(),
                        values.len()
                    ));
                }
                Some(_) => {}
            }
        }
        None
    }
}

impl ModelParameters for ParameterBlob {
    fn store(&self) -> Result<Vec<u8>, ModelError> {
        Ok(serde_json::to_vec(self)?)
    }

    fn load(bytes: &[u8]) -> Result<Self, ModelError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn is_compatible(&self, other: &Self) -> bool {
        self.layout_mismatch(other).is_none()
    }

    fn weighted_combine(parts: &[(&Self, f64)]) -> Result<Self, ModelError> {
        let Some((template, _)) = parts.first() else {
            return Err(ModelError::EmptyCombination {
                reason: "no parameter sets given",
            });
        };

        // Accumulate in f64 so many small weights do not lose precision.
        let mut sums: BTreeMap<&str, Vec<f64>> = template
            .tensors
            .iter()
            .map(|(name, values)| (name.as_str(), vec![0.0; values.len()]))
            .collect();

        for (params, weight) in parts {
            if let Some(reason) = template.layout_mismatch(params) {
                return Err(ModelError::Incompatible { reason });
            }
            for (name, values) in &params.tensors {
                let Some(acc) = sums.get_mut(name.as_str()) else {
                    continue;
                };
                for (slot, value) in acc.iter_mut().zip(values) {
                    *slot += f64::from(*value) * weight;
                }
            }
        }

        let tensors = sums
            .into_iter()
            .map(|(name, acc)| {
                #[allow(clippy::cast_possible_truncation)]
                let values = acc.into_iter().map(|v| v as f32).collect();
                (name.to_owned(), values)
            })
            .collect();
        Ok(Self { tensors })
    }
}
