//! Quorums, quorum kinds, and the quorum membership checksum.

use crate::crypto::{PublicKey, PUBLIC_KEY_SIZE};
use crate::identifiers::BlockHeight;

/// Maximum validators per blink subquorum.
pub const BLINK_SUBQUORUM_SIZE: usize = 10;

/// Approvals required in *each* subquorum for a blink tx to be accepted.
/// Must exceed half the subquorum size so approval and rejection are
/// mutually exclusive.
pub const BLINK_MIN_VOTES: usize = 7;

/// A blink authorization references two subquorums, Q and Q'.
pub const NUM_BLINK_SUBQUORUMS: usize = 2;

/// Spacing between consecutive blink quorum base heights.
pub const BLINK_QUORUM_INTERVAL: u64 = 5;

/// How far behind the authorization height the base quorum is drawn.
pub const BLINK_QUORUM_LAG: u64 = 30;

/// The role a quorum is drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum QuorumKind {
    Obligations = 0,
    Checkpointing = 1,
    Blink = 2,
}

impl QuorumKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(QuorumKind::Obligations),
            1 => Some(QuorumKind::Checkpointing),
            2 => Some(QuorumKind::Blink),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Minimum validator count for a quorum of this kind to produce a
    /// meaningful verdict.
    pub fn min_votes(self) -> usize {
        match self {
            QuorumKind::Obligations => 7,
            QuorumKind::Checkpointing => 13,
            QuorumKind::Blink => BLINK_MIN_VOTES,
        }
    }
}

impl std::fmt::Display for QuorumKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QuorumKind::Obligations => "obligations",
            QuorumKind::Checkpointing => "checkpointing",
            QuorumKind::Blink => "blink",
        };
        write!(f, "{name}")
    }
}

/// An ordered set of validators drawn for a specific role and height.
///
/// Order matters: a validator's index in `validators` is its signature slot
/// and its position in the connection schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quorum {
    pub validators: Vec<PublicKey>,
}

impl Quorum {
    pub fn new(validators: Vec<PublicKey>) -> Self {
        Quorum { validators }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Index of `pubkey` in this quorum, if it is a member.
    pub fn position_of(&self, pubkey: &PublicKey) -> Option<usize> {
        self.validators.iter().position(|v| v == pubkey)
    }
}

/// Height the subquorum `index` of a blink authorization at `height` is
/// drawn from. Returns `None` too early in the chain for the lag.
pub fn blink_quorum_height(height: BlockHeight, index: usize) -> Option<BlockHeight> {
    debug_assert!(index < NUM_BLINK_SUBQUORUMS);
    let base = height.0 - height.0 % BLINK_QUORUM_INTERVAL;
    let h = base.checked_sub(BLINK_QUORUM_LAG)? + index as u64 * BLINK_QUORUM_INTERVAL;
    Some(BlockHeight(h))
}

/// 64-bit checksum over an ordered validator sequence.
///
/// Each validator contributes an 8-byte little-endian window read from its
/// key, starting at the running offset (mod key size, wrapping around the
/// key end); the offset advances by one per validator. Summation wraps.
/// Callers give each subquorum a distinct starting offset so that swapping
/// Q and Q' changes the result.
pub fn quorum_checksum(validators: &[PublicKey], offset: usize) -> u64 {
    let mut sum: u64 = 0;
    let mut offset = offset;
    for pk in validators {
        offset %= PUBLIC_KEY_SIZE;
        let bytes = pk.as_bytes();
        let mut window = [0u8; 8];
        for (i, w) in window.iter_mut().enumerate() {
            *w = bytes[(offset + i) % PUBLIC_KEY_SIZE];
        }
        sum = sum.wrapping_add(u64::from_le_bytes(window));
        offset += 1;
    }
    sum
}
