//! Core types for the blink fast-finality quorum protocol.
//!
//! This crate provides the foundational types used throughout the protocol
//! implementation:
//!
//! - **Primitives**: Hash, signing keys and signatures, transport identities
//! - **Quorums**: ordered validator sets, kinds, the membership checksum
//! - **Connection schedule**: the deterministic relay topology indices
//! - **Votes**: the quorum vote schema relayed between members
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod conn_matrix;
mod crypto;
mod hash;
mod identifiers;
mod quorum;
mod signing;
mod transaction;
mod vote;

pub use conn_matrix::{quorum_incoming_conns, quorum_outgoing_conns};
pub use crypto::{
    KeyPair, PublicKey, ServiceNodeKeys, Signature, X25519PublicKey, PUBLIC_KEY_SIZE,
    SIGNATURE_SIZE,
};
pub use hash::{Hash, HexError, HASH_SIZE};
pub use identifiers::BlockHeight;
pub use quorum::{
    blink_quorum_height, quorum_checksum, Quorum, QuorumKind, BLINK_MIN_VOTES,
    BLINK_QUORUM_INTERVAL, BLINK_QUORUM_LAG, BLINK_SUBQUORUM_SIZE, NUM_BLINK_SUBQUORUMS,
};
pub use signing::{
    blink_vote_message, quorum_vote_message, DOMAIN_BLINK_VOTE, DOMAIN_QUORUM_VOTE,
};
pub use transaction::{Transaction, TxParseError, MAX_TX_SIZE};
pub use vote::{QuorumVote, VotePayload, VoterGroup, WorkerState, VOTE_VERSION};
