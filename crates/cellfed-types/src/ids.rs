//! Type-safe identifier wrappers.
//!
//! UEs and workers are both identified by free-form labels on the wire
//! (`UE_7`, `UE_GEN_3`, `worker-1`). Wrapping them in distinct newtypes
//! prevents accidentally passing a UE label where a worker id is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around a [`String`] label with standard derives.
macro_rules! define_label_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from any string label.
            pub fn new(label: impl Into<String>) -> Self {
                Self(label.into())
            }

            /// Borrow the label.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner label.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(label: String) -> Self {
                Self(label)
            }
        }

        impl From<&str> for $name {
            fn from(label: &str) -> Self {
                Self(label.to_owned())
            }
        }
    };
}

define_label_id! {
    /// Identifier of a user equipment whose control-plane messages appear
    /// in a trace.
    UeId
}

define_label_id! {
    /// Identifier of a training worker submitting updates to the coordinator.
    WorkerId
}

impl UeId {
    /// Label for the `index`-th simulated UE (`UE_{index}`).
    pub fn simulated(index: usize) -> Self {
        Self(format!("UE_{index}"))
    }

    /// Label for the `index`-th sequence sampled from a trained model
    /// (`UE_GEN_{index}`).
    pub fn generated(index: usize) -> Self {
        Self(format!("UE_GEN_{index}"))
    }
}

impl WorkerId {
    /// Generate a fresh worker id using UUID v7 (time-ordered).
    pub fn generate() -> Self {
        Self(format!("worker-{}", Uuid::now_v7()))
    }
}
