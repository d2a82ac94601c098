//! Relay service: gossip of new blocks and transactions between peers.
//!
//! Peers advertise what they have (`Have`) and request what they lack
//! (`Send`), with back-pressure against the object store and a bounded
//! number of outstanding downloads per peer. Constants are transcribed
//! from `relay.cpp`'s `#define`s.

use std::time::Duration;

use crate::types::Oid;

pub const RELAY_HEARTBEAT: Duration = Duration::from_millis(100);
pub const RELAY_TIMEOUT: Duration = Duration::from_secs(40);
pub const RELAY_DOWNLOAD_LOW_WATER: usize = 12;
pub const RELAY_DOWNLOAD_HIGH_WATER: usize = 5;
pub const RELAY_DIR_REFRESH: Duration = Duration::from_secs(1500);

/// High-watermark on outstanding `CC_CMD_SEND` requests this peer may have
/// in flight at once, transcribed from `CC_TX_SEND_MAX`. A peer asking for
/// more than this in a single `CC_CMD_SEND` is refused wholesale with
/// `CC_RESULT_BUFFER_FULL` rather than partially served.
pub const CC_TX_SEND_MAX: usize = 64;

/// The connection-level state machine a peer progresses through, mirroring
/// the original's `RelayConnection` lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnState {
    Connecting,
    Connected,
    Draining,
    Stopped,
}

/// Outcome of a peer's `CC_CMD_SEND_*` request against the bounded send
/// ring: either every requested object is admitted, or none are — the
/// request is rejected as a whole with `CC_RESULT_BUFFER_FULL` so the
/// caller never has to reason about a partially accepted batch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SendAdmission {
    Accepted(Vec<Oid>),
    BufferFull,
}

/// Admits or rejects a `CC_CMD_SEND_*` request against the outstanding-send
/// high-watermark. `already_outstanding` is how many sends this peer
/// already has in flight on the outbound ring.
pub fn admit_send_request(already_outstanding: usize, requested: &[Oid]) -> SendAdmission {
    if already_outstanding + requested.len() > CC_TX_SEND_MAX {
        SendAdmission::BufferFull
    } else {
        SendAdmission::Accepted(requested.to_vec())
    }
}

/// Gossip message exchanged between relay peers.
#[derive(Clone, Debug)]
pub enum RelayMessage {
    /// "I have this object" — announces an `Oid` a peer can request.
    Have(Oid),
    /// "Send me this object" — requests the full body of a previously
    /// announced `Oid`.
    Send(Oid),
    /// The requested body, or an empty announcement the peer no longer has it.
    Body { oid: Oid, bytes: Option<Vec<u8>> },
    Heartbeat,
}

/// Per-peer outstanding-request state. A peer's downloads are refilled up
/// to [`RELAY_DOWNLOAD_LOW_WATER`] whenever they drop to
/// [`RELAY_DOWNLOAD_HIGH_WATER`] or below, giving the classic low/high
/// watermark hysteresis instead of refilling on every single completion.
pub struct PeerRelayState {
    pub outstanding: std::collections::VecDeque<Oid>,
    pub last_heartbeat: std::time::Instant,
    pub send_ring_full: bool,
}

impl PeerRelayState {
    pub fn new() -> Self {
        PeerRelayState {
            outstanding: std::collections::VecDeque::new(),
            last_heartbeat: std::time::Instant::now(),
            send_ring_full: false,
        }
    }

    /// Whether this peer's download window should be topped up.
    pub fn needs_refill(&self) -> bool {
        self.outstanding.len() <= RELAY_DOWNLOAD_HIGH_WATER
    }

    pub fn refill_count(&self) -> usize {
        RELAY_DOWNLOAD_LOW_WATER.saturating_sub(self.outstanding.len())
    }

    pub fn is_timed_out(&self) -> bool {
        self.last_heartbeat.elapsed() > RELAY_TIMEOUT
    }
}

impl Default for PeerRelayState {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides whether to request an announced object, consulting the object
/// store's capacity so a flood of `Have` announcements cannot be used to
/// force unbounded memory growth ("BUFFER-FULL back-pressure").
pub fn should_request(peer: &PeerRelayState, object_store_over_capacity: bool) -> bool {
    !object_store_over_capacity && peer.needs_refill()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refill_triggers_at_high_water_mark() {
        let mut peer = PeerRelayState::new();
        for i in 0..RELAY_DOWNLOAD_HIGH_WATER {
            peer.outstanding.push_back(Oid(crate::types::Hash256([i as u8; 32])));
        }
        assert!(peer.needs_refill());
        assert_eq!(peer.refill_count(), RELAY_DOWNLOAD_LOW_WATER - RELAY_DOWNLOAD_HIGH_WATER);
    }

    #[test]
    fn no_refill_above_high_water_mark() {
        let mut peer = PeerRelayState::new();
        for i in 0..(RELAY_DOWNLOAD_HIGH_WATER + 1) {
            peer.outstanding.push_back(Oid(crate::types::Hash256([i as u8; 32])));
        }
        assert!(!peer.needs_refill());
    }

    #[test]
    fn back_pressure_blocks_requests_when_store_is_full() {
        let peer = PeerRelayState::new();
        assert!(!should_request(&peer, true));
        assert!(should_request(&peer, false));
    }

    #[test]
    fn send_request_within_watermark_is_accepted_in_full() {
        let requested: Vec<Oid> = (0..10).map(|i| Oid(crate::types::Hash256([i as u8; 32]))).collect();
        let admission = admit_send_request(0, &requested);
        assert_eq!(admission, SendAdmission::Accepted(requested));
    }

    #[test]
    fn send_request_exceeding_watermark_is_refused_wholesale() {
        let requested: Vec<Oid> = (0..(CC_TX_SEND_MAX + 1) as u8).map(|i| Oid(crate::types::Hash256([i; 32]))).collect();
        let admission = admit_send_request(0, &requested);
        assert_eq!(admission, SendAdmission::BufferFull);
    }

    #[test]
    fn send_request_accounts_for_already_outstanding() {
        let requested: Vec<Oid> = (0..5).map(|i| Oid(crate::types::Hash256([i as u8; 32]))).collect();
        let admission = admit_send_request(CC_TX_SEND_MAX - 2, &requested);
        assert_eq!(admission, SendAdmission::BufferFull);
    }
}
