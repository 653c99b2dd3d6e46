//! Peer topology, command dispatch, and vote relay for the blink quorum
//! network.
//!
//! The pieces here are transport-agnostic: the socket layer, the service
//! node registry, and the chain are reached through the traits in
//! [`traits`], and everything else is pure computation over quorum
//! membership.

mod dispatcher;
mod peers;
mod relay;
mod traits;

pub use dispatcher::{CommandAccess, CommandDispatcher, IncomingMessage};
pub use peers::PeerInfo;
pub use relay::VoteRelay;
pub use traits::{
    NodeDirectory, NodeRecord, QuorumSource, SendKind, Transport, VoteOutcome, VotePool,
};
