//! Per-UE control-plane state machine.
//!
//! Every state except [`UeState::Connected`] has exactly one outgoing
//! transition: it emits a fixed message and moves to a fixed next state.
//! In `Connected` a uniform draw decides between staying connected (a data
//! transfer in either direction) and starting a detach.
//!
//! ```text
//! IDLE -> RRC_WAIT -> RRC_SETUP -> ATTACH_START -> AUTH_WAIT -> AUTH_RESP
//!      -> SEC_WAIT -> SEC_COMP -> ATTACH_ACC_WAIT -> ATTACH_COMP -> CONNECTED
//! CONNECTED --(p = 0.8)--> CONNECTED      (DATA_TRANSFER_UPLINK | _DOWNLINK)
//! CONNECTED --(p = 0.2)--> DETACH_WAIT    (DETACH_REQUEST)
//! DETACH_WAIT -> IDLE                     (DETACH_ACCEPT)
//! ```

use cellfed_types::{EventTag, UeId, UeState};
use rand::Rng;

/// Probability that a connected UE keeps exchanging data instead of
/// detaching.
pub const CONNECTED_STAY_PROBABILITY: f64 = 0.8;

/// The fixed transition out of every state except [`UeState::Connected`].
///
/// Returns the emitted message and the next state, or `None` for
/// `Connected`, whose transition is probabilistic.
pub const fn deterministic_transition(state: UeState) -> Option<(EventTag, UeState)> {
    let step = match state {
        UeState::Idle => (EventTag::RrcConnectionRequest, UeState::RrcWait),
        UeState::RrcWait => (EventTag::RrcConnectionSetup, UeState::RrcSetup),
        UeState::RrcSetup => (EventTag::RrcConnectionSetupComplete, UeState::AttachStart),
        UeState::AttachStart => (EventTag::AttachRequest, UeState::AuthWait),
        UeState::AuthWait => (EventTag::AuthRequest, UeState::AuthResp),
        UeState::AuthResp => (EventTag::AuthResponse, UeState::SecWait),
        UeState::SecWait => (EventTag::SecModeCommand, UeState::SecComp),
        UeState::SecComp => (EventTag::SecModeComplete, UeState::AttachAccWait),
        UeState::AttachAccWait => (EventTag::AttachAccept, UeState::AttachComp),
        UeState::AttachComp => (EventTag::AttachComplete, UeState::Connected),
        UeState::DetachWait => (EventTag::DetachAccept, UeState::Idle),
        UeState::Connected => return None,
    };
    Some(step)
}

/// Resolve the connected-state branch for a given uniform draw.
///
/// `draw` is a sample from `[0, 1)`; `uplink` picks the direction of the
/// data transfer and is ignored when the UE detaches.
pub const fn connected_transition(draw: f64, uplink: bool) -> (EventTag, UeState) {
    if draw < CONNECTED_STAY_PROBABILITY {
        let tag = if uplink {
            EventTag::DataTransferUplink
        } else {
            EventTag::DataTransferDownlink
        };
        (tag, UeState::Connected)
    } else {
        (EventTag::DetachRequest, UeState::DetachWait)
    }
}

/// Messages a UE in `state` can emit next.
pub const fn expected_emissions(state: UeState) -> &'static [EventTag] {
    match state {
        UeState::Connected => &[
            EventTag::DataTransferUplink,
            EventTag::DataTransferDownlink,
            EventTag::DetachRequest,
        ],
        UeState::Idle => &[EventTag::RrcConnectionRequest],
        UeState::RrcWait => &[EventTag::RrcConnectionSetup],
        UeState::RrcSetup => &[EventTag::RrcConnectionSetupComplete],
        UeState::AttachStart => &[EventTag::AttachRequest],
        UeState::AuthWait => &[EventTag::AuthRequest],
        UeState::AuthResp => &[EventTag::AuthResponse],
        UeState::SecWait => &[EventTag::SecModeCommand],
        UeState::SecComp => &[EventTag::SecModeComplete],
        UeState::AttachAccWait => &[EventTag::AttachAccept],
        UeState::AttachComp => &[EventTag::AttachComplete],
        UeState::DetachWait => &[EventTag::DetachAccept],
    }
}

/// Apply `tag` to a UE in `state`, returning the next state, or `None` if
/// the state cannot emit that message.
pub fn step_with(state: UeState, tag: EventTag) -> Option<UeState> {
    match deterministic_transition(state) {
        Some((expected, next)) => (expected == tag).then_some(next),
        None => match tag {
            EventTag::DataTransferUplink | EventTag::DataTransferDownlink => {
                Some(UeState::Connected)
            }
            EventTag::DetachRequest => Some(UeState::DetachWait),
            _ => None,
        },
    }
}

/// The state a UE must be in to emit `tag`, if the simulator ever emits it.
pub fn emitting_state(tag: EventTag) -> Option<UeState> {
    ALL_STATES
        .into_iter()
        .find(|state| expected_emissions(*state).contains(&tag))
}

/// Every UE state, in protocol order.
pub const ALL_STATES: [UeState; 12] = [
    UeState::Idle,
    UeState::RrcWait,
    UeState::RrcSetup,
    UeState::AttachStart,
    UeState::AuthWait,
    UeState::AuthResp,
    UeState::SecWait,
    UeState::SecComp,
    UeState::AttachAccWait,
    UeState::AttachComp,
    UeState::Connected,
    UeState::DetachWait,
];

/// A simulated UE: its identity, protocol state, and emitted messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeStateMachine {
    id: UeId,
    state: UeState,
    history: Vec<EventTag>,
}

impl UeStateMachine {
    /// Create a UE in [`UeState::Idle`] with an empty history.
    pub const fn new(id: UeId) -> Self {
        Self::with_state(id, UeState::Idle)
    }

    /// Create a UE positioned at an arbitrary state.
    pub const fn with_state(id: UeId, state: UeState) -> Self {
        Self {
            id,
            state,
            history: Vec::new(),
        }
    }

    /// The UE's identifier.
    pub const fn id(&self) -> &UeId {
        &self.id
    }

    /// Current protocol state.
    pub const fn state(&self) -> UeState {
        self.state
    }

    /// Every message emitted so far, oldest first.
    pub fn history(&self) -> &[EventTag] {
        &self.history
    }

    /// Return to [`UeState::Idle`] and forget the history.
    pub fn reset(&mut self) {
        self.state = UeState::Idle;
        self.history.clear();
    }

    /// Take one transition, returning the emitted message.
    ///
    /// The transition function is total over the closed state set, so every
    /// call emits exactly one message. Randomness is only consumed in
    /// [`UeState::Connected`]: one uniform draw for the branch, plus one
    /// coin flip for the transfer direction when the UE stays connected.
    pub fn advance(&mut self, rng: &mut impl Rng) -> EventTag {
        let (tag, next) = deterministic_transition(self.state).unwrap_or_else(|| {
            let draw: f64 = rng.random();
            let uplink = draw < CONNECTED_STAY_PROBABILITY && rng.random_bool(0.5);
            connected_transition(draw, uplink)
        });

        self.state = next;
        self.history.push(tag);
        tag
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    /// Generator returning the same word forever, used to force a branch.
    struct ConstRng(u64);

    impl rand::RngCore for ConstRng {
        fn next_u32(&mut self) -> u32 {
            u32::try_from(self.0 >> 32).unwrap_or(u32::MAX)
        }

        fn next_u64(&mut self) -> u64 {
            self.0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            for (i, byte) in dst.iter_mut().enumerate() {
                *byte = self.0.to_le_bytes()[i % 8];
            }
        }
    }

    fn ue() -> UeStateMachine {
        UeStateMachine::new(UeId::simulated(0))
    }

    #[test]
    fn starts_idle_with_empty_history() {
        let ue = ue();
        assert_eq!(ue.state(), UeState::Idle);
        assert!(ue.history().is_empty());
    }

    #[test]
    fn walks_attach_procedure_deterministically() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut ue = ue();
        let emitted: Vec<EventTag> = (0..10).map(|_| ue.advance(&mut rng)).collect();
        assert_eq!(
            emitted,
            vec![
                EventTag::RrcConnectionRequest,
                EventTag::RrcConnectionSetup,
                EventTag::RrcConnectionSetupComplete,
                EventTag::AttachRequest,
                EventTag::AuthRequest,
                EventTag::AuthResponse,
                EventTag::SecModeCommand,
                EventTag::SecModeComplete,
                EventTag::AttachAccept,
                EventTag::AttachComplete,
            ]
        );
        assert_eq!(ue.state(), UeState::Connected);
        assert_eq!(ue.history(), emitted.as_slice());
    }

    #[test]
    fn low_draw_stays_connected() {
        let mut ue = UeStateMachine::with_state(UeId::simulated(1), UeState::Connected);
        let tag = ue.advance(&mut ConstRng(0));
        assert!(tag.is_data_transfer());
        assert_eq!(ue.state(), UeState::Connected);
    }

    #[test]
    fn high_draw_detaches_then_returns_to_idle() {
        let mut ue = UeStateMachine::with_state(UeId::simulated(1), UeState::Connected);
        let mut rng = ConstRng(u64::MAX);
        assert_eq!(ue.advance(&mut rng), EventTag::DetachRequest);
        assert_eq!(ue.state(), UeState::DetachWait);
        assert_eq!(ue.advance(&mut rng), EventTag::DetachAccept);
        assert_eq!(ue.state(), UeState::Idle);
    }

    #[test]
    fn connected_branch_boundaries() {
        assert_eq!(
            connected_transition(0.0, true),
            (EventTag::DataTransferUplink, UeState::Connected)
        );
        assert_eq!(
            connected_transition(0.799, false),
            (EventTag::DataTransferDownlink, UeState::Connected)
        );
        assert_eq!(
            connected_transition(0.8, true),
            (EventTag::DetachRequest, UeState::DetachWait)
        );
    }

    #[test]
    fn every_emission_is_a_valid_successor() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut ue = ue();
        for _ in 0..20_000 {
            let before = ue.state();
            let tag = ue.advance(&mut rng);
            assert!(
                expected_emissions(before).contains(&tag),
                "{tag} is not a successor of {before:?}"
            );
            assert_eq!(step_with(before, tag), Some(ue.state()));
        }
    }

    #[test]
    fn detach_fraction_is_one_fifth() {
        const N: u32 = 20_000;
        let mut rng = SmallRng::seed_from_u64(2024);
        let mut detaches = 0_u32;
        for _ in 0..N {
            let mut ue = UeStateMachine::with_state(UeId::simulated(0), UeState::Connected);
            if ue.advance(&mut rng) == EventTag::DetachRequest {
                detaches += 1;
            }
        }
        let fraction = f64::from(detaches) / f64::from(N);
        let tolerance = 2.0 / f64::from(N).sqrt();
        assert!(
            (fraction - 0.2).abs() < tolerance,
            "detach fraction {fraction} outside 0.2 +/- {tolerance}"
        );
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut ue = ue();
        ue.advance(&mut rng);
        ue.advance(&mut rng);
        ue.reset();
        assert_eq!(ue.state(), UeState::Idle);
        assert!(ue.history().is_empty());
    }

    #[test]
    fn emitting_state_inverts_expected_emissions() {
        assert_eq!(emitting_state(EventTag::AuthResponse), Some(UeState::AuthResp));
        assert_eq!(emitting_state(EventTag::DetachRequest), Some(UeState::Connected));
        assert_eq!(emitting_state(EventTag::ServiceRequest), None);
        assert_eq!(step_with(UeState::Idle, EventTag::AttachAccept), None);
    }
}
