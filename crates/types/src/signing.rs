//! Domain-separated signing messages.
//!
//! Every signing context hashes under a distinct constant prefix so that a
//! signature produced for one purpose can never be replayed as another. In
//! particular the approval bit is folded into the blink vote hash: an
//! approval signature is useless as a rejection and vice versa.

use crate::hash::Hash;
use crate::identifiers::BlockHeight;
use crate::vote::{QuorumVote, VotePayload};

/// Domain tag for blink approval/rejection votes.
pub const DOMAIN_BLINK_VOTE: &[u8] = b"blink.vote.v1";

/// Domain tag for quorum misbehavior/checkpoint votes.
pub const DOMAIN_QUORUM_VOTE: &[u8] = b"quorum.vote.v1";

/// The 32-byte message a blink quorum member signs to approve or reject a
/// transaction at a given authorization height.
pub fn blink_vote_message(height: BlockHeight, tx_hash: &Hash, approval: bool) -> Hash {
    let mut buf = Vec::with_capacity(DOMAIN_BLINK_VOTE.len() + 8 + 32 + 1);
    buf.extend_from_slice(DOMAIN_BLINK_VOTE);
    buf.extend_from_slice(&height.0.to_le_bytes());
    buf.extend_from_slice(tx_hash.as_bytes());
    buf.push(approval as u8);
    Hash::from_bytes(&buf)
}

/// The 32-byte message signed by a quorum vote. Covers every field except
/// the signature itself.
pub fn quorum_vote_message(vote: &QuorumVote) -> Hash {
    let mut buf = Vec::with_capacity(DOMAIN_QUORUM_VOTE.len() + 64);
    buf.extend_from_slice(DOMAIN_QUORUM_VOTE);
    buf.push(vote.version);
    buf.push(vote.kind.as_u8());
    buf.extend_from_slice(&vote.height.0.to_le_bytes());
    buf.push(vote.group.as_u8());
    buf.extend_from_slice(&vote.index_in_group.to_le_bytes());
    match &vote.payload {
        VotePayload::Checkpoint { block_hash } => {
            buf.extend_from_slice(block_hash.as_bytes());
        }
        VotePayload::StateChange {
            worker_index,
            state,
        } => {
            buf.extend_from_slice(&worker_index.to_le_bytes());
            buf.push(state.as_u8());
        }
    }
    Hash::from_bytes(&buf)
}
