//! Collaborator traits at the protocol boundary.
//!
//! The quorum network does not own chain state, the service node registry,
//! or the socket layer; it reaches them through these traits. Implementations
//! must be internally synchronized: every method may be called from multiple
//! transport worker threads at once.

use blink_types::{BlockHeight, PublicKey, Quorum, QuorumKind, QuorumVote, X25519PublicKey};
use std::sync::Arc;

/// Transport details for a registered service node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeRecord {
    /// The node's transport identity, if it has published one.
    pub x25519: Option<X25519PublicKey>,
    /// Network endpoint, e.g. `tcp://1.2.3.4:5678`.
    pub endpoint: Option<String>,
    /// Whether the node is currently active in the registry.
    pub active: bool,
}

impl NodeRecord {
    /// Transport identity and endpoint, if this node can be connected to.
    pub fn reachable(&self) -> Option<(X25519PublicKey, &str)> {
        if !self.active {
            return None;
        }
        match (&self.x25519, &self.endpoint) {
            (Some(x25519), Some(endpoint)) => Some((*x25519, endpoint.as_str())),
            _ => None,
        }
    }
}

/// The service node registry, mapping identities to transport details.
pub trait NodeDirectory: Send + Sync {
    /// Resolve a validator identity to its registration record.
    fn resolve(&self, pubkey: &PublicKey) -> Option<NodeRecord>;

    /// Reverse-map a transport identity to the primary identity.
    fn pubkey_from_x25519(&self, x25519: &X25519PublicKey) -> Option<PublicKey>;
}

/// The quorum source: ordered validator sets per role and height, plus the
/// local chain tip they are drawn against.
pub trait QuorumSource: Send + Sync {
    /// The quorum of the given kind at the given height, if one exists.
    fn quorum(&self, kind: QuorumKind, height: BlockHeight) -> Option<Arc<Quorum>>;

    /// Current height of the local chain.
    fn current_height(&self) -> BlockHeight;
}

/// How a message send should treat a missing connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendKind {
    /// Open a connection to `endpoint` if one is not already established.
    Strong { endpoint: String },
    /// Deliver only over an already-open connection; drop otherwise.
    Weak,
}

/// The authenticated message transport.
///
/// Sends are fire-and-forget: delivery failures are the transport's to log
/// and the protocol's monotone state makes redelivery safe.
pub trait Transport: Send + Sync {
    fn send(&self, to: &X25519PublicKey, command: &str, payload: &[u8], kind: SendKind);
}

/// What the external vote service did with a submitted vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteOutcome {
    pub verification_failed: bool,
    pub added_to_pool: bool,
}

/// The external vote verification and collection service.
pub trait VotePool: Send + Sync {
    fn add_vote(&self, vote: &QuorumVote) -> VoteOutcome;
}
