//! Per-quorum peer computation and relay.
//!
//! From the local node's positions inside one or more ordered quorums,
//! [`PeerInfo`] derives the set of peers a message must be relayed to:
//! strong peers (open a connection if needed) from the outgoing half of the
//! connection schedule, weak peers (send only if already connected) from the
//! incoming half, and inter-quorum bridge edges for multi-subquorum
//! operation. The result is a map from transport identity to
//! endpoint-or-nothing; an absent endpoint marks a weak peer.

use crate::traits::{NodeDirectory, SendKind, Transport};
use blink_types::{quorum_incoming_conns, quorum_outgoing_conns, PublicKey, Quorum, X25519PublicKey};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

/// Computed relay peers for a set of quorums.
pub struct PeerInfo {
    /// The local node's position in each quorum, -1 if absent.
    my_position: Vec<i32>,
    /// Number of quorums the local node is actually in.
    my_position_count: usize,
    /// Transport identity -> endpoint (strong) or `None` (weak).
    peers: HashMap<X25519PublicKey, Option<String>>,
    strong_peers: usize,
}

impl PeerInfo {
    /// Compute relay peers for `my_pubkey` across `quorums`.
    ///
    /// With `opportunistic` set, incoming-schedule peers are included as
    /// weak targets. `exclude` removes peers that are known to already have
    /// the payload (the sender, typically); the local node is always
    /// excluded.
    pub fn compute(
        my_pubkey: &PublicKey,
        quorums: &[Arc<Quorum>],
        directory: &dyn NodeDirectory,
        opportunistic: bool,
        mut exclude: HashSet<PublicKey>,
    ) -> Self {
        exclude.insert(*my_pubkey);

        let my_position: Vec<i32> = quorums
            .iter()
            .map(|q| q.position_of(my_pubkey).map(|p| p as i32).unwrap_or(-1))
            .collect();
        let my_position_count = my_position.iter().filter(|p| **p >= 0).count();

        // Every edge we intend to add, in priority order (strong first per
        // quorum so a later weak mention of the same peer cannot downgrade
        // it; add_peer only ever upgrades).
        let mut planned: Vec<(PublicKey, bool)> = Vec::new();
        for (i, quorum) in quorums.iter().enumerate() {
            let pos = my_position[i];
            if pos < 0 {
                trace!(subquorum = i, "not in subquorum");
                continue;
            }
            let validators = &quorum.validators;

            for j in quorum_outgoing_conns(pos, validators.len()) {
                planned.push((validators[j], true));
            }
            if opportunistic {
                for j in quorum_incoming_conns(pos, validators.len()) {
                    planned.push((validators[j], false));
                }
            }

            // Inter-quorum bridges. A node in the second half of this
            // subquorum but not in the next one relays strongly to the
            // matching first-half position of the next; the mirror edge
            // (first half of a subquorum back into the second half of the
            // previous) is weak. "Half" is half the smaller subquorum, so
            // odd sizes leave the last position unbridged. Nodes in both
            // subquorums already reach the other side via intra-quorum
            // edges.
            let p = pos as usize;
            if i + 1 < quorums.len() && my_position[i + 1] < 0 {
                let next = &quorums[i + 1].validators;
                let half = validators.len().min(next.len()) / 2;
                if half > 0 && p >= half && p < 2 * half {
                    trace!(from = i, to = i + 1, target = p - half, "bridge edge");
                    planned.push((next[p - half], true));
                }
            }
            if i > 0 && my_position[i - 1] < 0 {
                let prev = &quorums[i - 1].validators;
                let half = validators.len().min(prev.len()) / 2;
                if p < half {
                    trace!(from = i, to = i - 1, target = half + p, "reverse bridge edge");
                    planned.push((prev[half + p], false));
                }
            }
        }

        // Resolve every planned identity in one directory pass, skipping
        // inactive nodes and nodes without published transport details.
        let mut remotes: HashMap<PublicKey, (X25519PublicKey, String)> = HashMap::new();
        for (pubkey, _) in &planned {
            if exclude.contains(pubkey) || remotes.contains_key(pubkey) {
                continue;
            }
            let Some(record) = directory.resolve(pubkey) else {
                trace!(peer = %pubkey, "peer not in directory");
                continue;
            };
            match record.reachable() {
                Some((x25519, endpoint)) => {
                    remotes.insert(*pubkey, (x25519, endpoint.to_string()));
                }
                None => trace!(peer = %pubkey, "peer inactive or missing transport details"),
            }
        }

        let mut info = PeerInfo {
            my_position,
            my_position_count,
            peers: HashMap::new(),
            strong_peers: 0,
        };
        for (pubkey, strong) in planned {
            if !exclude.contains(&pubkey) {
                info.add_peer(&remotes, &pubkey, strong);
            }
        }
        info
    }

    /// Add `pubkey` as a relay target if it resolved. A strong mention of an
    /// existing weak entry upgrades it; nothing ever downgrades.
    fn add_peer(
        &mut self,
        remotes: &HashMap<PublicKey, (X25519PublicKey, String)>,
        pubkey: &PublicKey,
        strong: bool,
    ) -> bool {
        let Some((x25519, endpoint)) = remotes.get(pubkey) else {
            return false;
        };
        match self.peers.entry(*x25519) {
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(strong.then(|| endpoint.clone()));
                if strong {
                    self.strong_peers += 1;
                }
                true
            }
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                if strong && entry.get().is_none() {
                    entry.insert(Some(endpoint.clone()));
                    self.strong_peers += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// The local node's position in each quorum, -1 where absent.
    pub fn my_position(&self) -> &[i32] {
        &self.my_position
    }

    /// In how many of the quorums the local node holds a position.
    pub fn my_position_count(&self) -> usize {
        self.my_position_count
    }

    pub fn in_any_quorum(&self) -> bool {
        self.my_position_count > 0
    }

    pub fn strong_peer_count(&self) -> usize {
        self.strong_peers
    }

    pub fn opportunistic_peer_count(&self) -> usize {
        self.peers.len() - self.strong_peers
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Send `command` with `payload` to every computed peer.
    pub fn relay_to_peers(&self, transport: &dyn Transport, command: &str, payload: &[u8]) {
        for (x25519, endpoint) in &self.peers {
            match endpoint {
                Some(endpoint) => {
                    trace!(peer = %x25519, %endpoint, command, "relaying to strong peer");
                    transport.send(
                        x25519,
                        command,
                        payload,
                        SendKind::Strong {
                            endpoint: endpoint.clone(),
                        },
                    );
                }
                None => {
                    trace!(peer = %x25519, command, "relaying to peer if connected");
                    transport.send(x25519, command, payload, SendKind::Weak);
                }
            }
        }
    }
}
