//! Quorum vote schema.
//!
//! Votes are produced and verified by the external vote pool; this module
//! only defines the shape that travels over the relay.

use crate::crypto::Signature;
use crate::hash::Hash;
use crate::identifiers::BlockHeight;
use crate::quorum::QuorumKind;

/// Current vote wire version.
pub const VOTE_VERSION: u8 = 0;

/// Which side of a quorum a voter sits on.
///
/// Wire value 0 is reserved for "invalid" and is rejected on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VoterGroup {
    Validator = 1,
    Worker = 2,
}

impl VoterGroup {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(VoterGroup::Validator),
            2 => Some(VoterGroup::Worker),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Target state an obligations vote proposes for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkerState {
    Deregister = 0,
    Decommission = 1,
    Recommission = 2,
    IpChangePenalty = 3,
}

impl WorkerState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(WorkerState::Deregister),
            1 => Some(WorkerState::Decommission),
            2 => Some(WorkerState::Recommission),
            3 => Some(WorkerState::IpChangePenalty),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Kind-specific vote content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotePayload {
    /// Checkpointing votes commit to a block hash.
    Checkpoint { block_hash: Hash },
    /// Obligations votes propose a state change for a worker.
    StateChange {
        worker_index: u16,
        state: WorkerState,
    },
}

/// A vote cast inside a quorum, relayed between members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumVote {
    pub version: u8,
    pub kind: QuorumKind,
    pub height: BlockHeight,
    pub group: VoterGroup,
    pub index_in_group: u16,
    pub signature: Signature,
    pub payload: VotePayload,
}

impl QuorumVote {
    /// Whether the payload variant matches the vote kind.
    pub fn payload_matches_kind(&self) -> bool {
        match self.payload {
            VotePayload::Checkpoint { .. } => self.kind == QuorumKind::Checkpointing,
            VotePayload::StateChange { .. } => self.kind != QuorumKind::Checkpointing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voter_group_rejects_invalid() {
        assert_eq!(VoterGroup::from_u8(0), None);
        assert_eq!(VoterGroup::from_u8(1), Some(VoterGroup::Validator));
        assert_eq!(VoterGroup::from_u8(3), None);
    }

    #[test]
    fn test_payload_kind_consistency() {
        let vote = QuorumVote {
            version: VOTE_VERSION,
            kind: QuorumKind::Checkpointing,
            height: BlockHeight(5),
            group: VoterGroup::Validator,
            index_in_group: 0,
            signature: Signature::zero(),
            payload: VotePayload::Checkpoint {
                block_hash: Hash::ZERO,
            },
        };
        assert!(vote.payload_matches_kind());

        let mismatched = QuorumVote {
            kind: QuorumKind::Obligations,
            ..vote
        };
        assert!(!mismatched.payload_matches_kind());
    }
}
