//! Enumeration types for the cellfed workspace.
//!
//! The control-plane vocabulary is a simplified set of RRC and NAS
//! messages. Its order is part of the wire format: model token ids are
//! assigned by position in [`EventTag::ALL`].

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Control-plane messages
// ---------------------------------------------------------------------------

/// A control-plane message emitted by a UE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventTag {
    // --- RRC connection establishment ---
    /// UE asks the base station for an RRC connection.
    RrcConnectionRequest,
    /// Base station grants the RRC connection.
    RrcConnectionSetup,
    /// UE confirms RRC setup.
    RrcConnectionSetupComplete,

    // --- Attach, authentication, security ---
    /// UE requests network attachment.
    AttachRequest,
    /// Core network challenges the UE.
    AuthRequest,
    /// UE answers the authentication challenge.
    AuthResponse,
    /// Core network selects ciphering and integrity algorithms.
    SecModeCommand,
    /// UE confirms the security mode.
    SecModeComplete,
    /// Core network accepts the attach.
    AttachAccept,
    /// UE confirms the attach.
    AttachComplete,

    // --- Connected mode ---
    /// UE requests service from idle. Part of the vocabulary, never emitted
    /// by the simulator.
    ServiceRequest,
    /// User-plane activity in the uplink direction.
    DataTransferUplink,
    /// User-plane activity in the downlink direction.
    DataTransferDownlink,
    /// Base station releases the RRC connection. Part of the vocabulary,
    /// never emitted by the simulator.
    RrcConnectionRelease,

    // --- Detach ---
    /// UE asks to detach from the network.
    DetachRequest,
    /// Core network confirms the detach.
    DetachAccept,
}

impl EventTag {
    /// The full vocabulary in canonical order.
    pub const ALL: [Self; 16] = [
        Self::RrcConnectionRequest,
        Self::RrcConnectionSetup,
        Self::RrcConnectionSetupComplete,
        Self::AttachRequest,
        Self::AuthRequest,
        Self::AuthResponse,
        Self::SecModeCommand,
        Self::SecModeComplete,
        Self::AttachAccept,
        Self::AttachComplete,
        Self::ServiceRequest,
        Self::DataTransferUplink,
        Self::DataTransferDownlink,
        Self::RrcConnectionRelease,
        Self::DetachRequest,
        Self::DetachAccept,
    ];

    /// Wire name of the tag, as written in trace files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RrcConnectionRequest => "RRC_CONNECTION_REQUEST",
            Self::RrcConnectionSetup => "RRC_CONNECTION_SETUP",
            Self::RrcConnectionSetupComplete => "RRC_CONNECTION_SETUP_COMPLETE",
            Self::AttachRequest => "ATTACH_REQUEST",
            Self::AuthRequest => "AUTH_REQUEST",
            Self::AuthResponse => "AUTH_RESPONSE",
            Self::SecModeCommand => "SEC_MODE_COMMAND",
            Self::SecModeComplete => "SEC_MODE_COMPLETE",
            Self::AttachAccept => "ATTACH_ACCEPT",
            Self::AttachComplete => "ATTACH_COMPLETE",
            Self::ServiceRequest => "SERVICE_REQUEST",
            Self::DataTransferUplink => "DATA_TRANSFER_UPLINK",
            Self::DataTransferDownlink => "DATA_TRANSFER_DOWNLINK",
            Self::RrcConnectionRelease => "RRC_CONNECTION_RELEASE",
            Self::DetachRequest => "DETACH_REQUEST",
            Self::DetachAccept => "DETACH_ACCEPT",
        }
    }

    /// Position of the tag in [`EventTag::ALL`].
    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|tag| *tag == self)
            .unwrap_or_default()
    }

    /// Look up a tag by its position in [`EventTag::ALL`].
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Whether this is one of the two user-plane data transfer tags.
    pub const fn is_data_transfer(self) -> bool {
        matches!(self, Self::DataTransferUplink | Self::DataTransferDownlink)
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message name that is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event tag: {0}")]
pub struct UnknownEventTag(pub String);

impl FromStr for EventTag {
    type Err = UnknownEventTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| UnknownEventTag(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// UE protocol states
// ---------------------------------------------------------------------------

/// Protocol state of a simulated UE.
///
/// The set is closed and cyclic: there is no terminal state, a detached UE
/// returns to [`UeState::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UeState {
    /// No connection. Initial state.
    Idle,
    /// Waiting for the RRC connection setup.
    RrcWait,
    /// RRC setup received.
    RrcSetup,
    /// Ready to start the attach procedure.
    AttachStart,
    /// Waiting for the authentication challenge.
    AuthWait,
    /// Challenge received, about to respond.
    AuthResp,
    /// Waiting for the security mode command.
    SecWait,
    /// Security mode command received.
    SecComp,
    /// Waiting for the attach accept.
    AttachAccWait,
    /// Attach accepted, about to confirm.
    AttachComp,
    /// Attached and exchanging data.
    Connected,
    /// Detach requested, waiting for the accept.
    DetachWait,
}

// ---------------------------------------------------------------------------
// Coordinator submission status
// ---------------------------------------------------------------------------

/// Outcome of submitting a local update to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitStatus {
    /// The update is pending; quorum has not been reached yet.
    Waiting,
    /// The update completed a quorum and the global model was replaced.
    Aggregated,
    /// The update was based on an older round and was discarded. Only
    /// returned when the coordinator rejects stale submissions.
    Stale,
}

impl SubmitStatus {
    /// Wire name of the status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Aggregated => "AGGREGATED",
            Self::Stale => "STALE",
        }
    }
}

impl fmt::Display for SubmitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_order_is_stable() {
        assert_eq!(EventTag::ALL.len(), 16);
        assert_eq!(EventTag::RrcConnectionRequest.index(), 0);
        assert_eq!(EventTag::DetachAccept.index(), 15);
        assert_eq!(EventTag::from_index(11), Some(EventTag::DataTransferUplink));
        assert_eq!(EventTag::from_index(16), None);
    }

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for tag in EventTag::ALL {
            assert_eq!(tag.as_str().parse::<EventTag>(), Ok(tag));
        }
        assert!("PAGING".parse::<EventTag>().is_err());
    }

    #[test]
    fn serde_matches_wire_names() {
        let json = serde_json::to_string(&EventTag::SecModeCommand).unwrap();
        assert_eq!(json, "\"SEC_MODE_COMMAND\"");
        let status = serde_json::to_string(&SubmitStatus::Aggregated).unwrap();
        assert_eq!(status, "\"AGGREGATED\"");
    }

    #[test]
    fn only_two_data_transfer_tags() {
        let data: Vec<EventTag> = EventTag::ALL
            .into_iter()
            .filter(|t| t.is_data_transfer())
            .collect();
        assert_eq!(
            data,
            vec![EventTag::DataTransferUplink, EventTag::DataTransferDownlink]
        );
    }
}
