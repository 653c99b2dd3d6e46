//! Quorum vote relay.
//!
//! Votes originate in the external vote service (misbehavior decisions,
//! checkpoint signatures); this module moves them between quorum members
//! over the connection schedule and re-relays votes the service accepts
//! as new.

use crate::dispatcher::IncomingMessage;
use crate::peers::PeerInfo;
use crate::traits::{NodeDirectory, QuorumSource, Transport, VotePool};
use blink_types::{QuorumVote, ServiceNodeKeys};
use blink_wire::{bt, decode_vote, encode_vote, CMD_VOTE};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Relays quorum votes over the peer topology.
pub struct VoteRelay {
    keys: Option<Arc<ServiceNodeKeys>>,
    quorums: Arc<dyn QuorumSource>,
    directory: Arc<dyn NodeDirectory>,
    transport: Arc<dyn Transport>,
    votes: Arc<dyn VotePool>,
}

impl VoteRelay {
    pub fn new(
        keys: Option<Arc<ServiceNodeKeys>>,
        quorums: Arc<dyn QuorumSource>,
        directory: Arc<dyn NodeDirectory>,
        transport: Arc<dyn Transport>,
        votes: Arc<dyn VotePool>,
    ) -> Self {
        VoteRelay {
            keys,
            quorums,
            directory,
            transport,
            votes,
        }
    }

    /// Relay locally-originated (or newly accepted) votes to quorum peers.
    ///
    /// Votes for quorums this node is not a member of are skipped: relaying
    /// them would let a non-member inject traffic into the schedule.
    pub fn relay_votes(&self, votes: &[QuorumVote]) {
        let Some(keys) = &self.keys else {
            debug!("not relaying votes: no service node keys");
            return;
        };

        debug!(count = votes.len(), "starting vote relay");
        let mut relayed = 0;
        for vote in votes {
            let Some(quorum) = self.quorums.quorum(vote.kind, vote.height) else {
                warn!(kind = %vote.kind, height = %vote.height, "unable to relay vote: no quorum at height");
                continue;
            };
            if quorum.len() < vote.kind.min_votes() {
                warn!(
                    kind = %vote.kind,
                    height = %vote.height,
                    validators = quorum.len(),
                    required = vote.kind.min_votes(),
                    "unable to relay vote: quorum below minimum size"
                );
                continue;
            }

            let peers = PeerInfo::compute(
                &keys.public_key(),
                std::slice::from_ref(&quorum),
                self.directory.as_ref(),
                true,
                HashSet::new(),
            );
            if !peers.in_any_quorum() {
                warn!(kind = %vote.kind, height = %vote.height, "vote to relay does not include this node");
                continue;
            }

            let payload = bt::encode(&encode_vote(vote));
            peers.relay_to_peers(self.transport.as_ref(), CMD_VOTE, &payload);
            relayed += 1;
        }
        debug!(relayed, "vote relay complete");
    }

    /// Handle an inbound `vote` command.
    pub fn handle_vote(&self, message: &IncomingMessage) {
        debug!(sender = %message.sender, "received relayed vote");

        let vote = match decode_vote(&message.payload) {
            Ok(vote) => vote,
            Err(error) => {
                info!(sender = %message.sender, %error, "ignoring malformed vote");
                return;
            }
        };

        if vote.height > self.quorums.current_height() {
            debug!(height = %vote.height, "ignoring vote: block height too high");
            return;
        }

        let outcome = self.votes.add_vote(&vote);
        if outcome.verification_failed {
            warn!(height = %vote.height, "vote verification failed; ignoring vote");
            return;
        }
        if outcome.added_to_pool {
            self.relay_votes(std::slice::from_ref(&vote));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{NodeRecord, SendKind, VoteOutcome};
    use blink_types::{
        BlockHeight, Hash, KeyPair, PublicKey, Quorum, QuorumKind, Signature, VotePayload,
        VoterGroup, WorkerState, X25519PublicKey, VOTE_VERSION,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FixedQuorums {
        quorum: Arc<Quorum>,
        height: BlockHeight,
    }

    impl QuorumSource for FixedQuorums {
        fn quorum(&self, _kind: QuorumKind, _height: BlockHeight) -> Option<Arc<Quorum>> {
            Some(Arc::clone(&self.quorum))
        }

        fn current_height(&self) -> BlockHeight {
            self.height
        }
    }

    struct MapDirectory {
        records: HashMap<PublicKey, NodeRecord>,
    }

    impl NodeDirectory for MapDirectory {
        fn resolve(&self, pubkey: &PublicKey) -> Option<NodeRecord> {
            self.records.get(pubkey).cloned()
        }

        fn pubkey_from_x25519(&self, x25519: &X25519PublicKey) -> Option<PublicKey> {
            self.records
                .iter()
                .find(|(_, r)| r.x25519.as_ref() == Some(x25519))
                .map(|(pk, _)| *pk)
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(X25519PublicKey, String)>>,
    }

    impl Transport for RecordingTransport {
        fn send(&self, to: &X25519PublicKey, command: &str, _payload: &[u8], _kind: SendKind) {
            self.sent.lock().unwrap().push((*to, command.to_string()));
        }
    }

    struct FixedVotePool {
        outcome: VoteOutcome,
    }

    impl VotePool for FixedVotePool {
        fn add_vote(&self, _vote: &QuorumVote) -> VoteOutcome {
            self.outcome
        }
    }

    struct Fixture {
        relay: VoteRelay,
        transport: Arc<RecordingTransport>,
        member_x25519: X25519PublicKey,
    }

    fn make_fixture(local_in_quorum: bool, outcome: VoteOutcome) -> Fixture {
        let keypairs: Vec<KeyPair> = (0..10u8).map(|i| KeyPair::from_seed([i + 1; 32])).collect();
        let pubkeys: Vec<PublicKey> = keypairs.iter().map(|k| k.public_key()).collect();

        let records: HashMap<_, _> = pubkeys
            .iter()
            .enumerate()
            .map(|(i, pk)| {
                (
                    *pk,
                    NodeRecord {
                        x25519: Some(X25519PublicKey::from_bytes(
                            *Hash::from_bytes(pk.as_bytes()).as_bytes(),
                        )),
                        endpoint: Some(format!("tcp://10.1.0.{i}:7800")),
                        active: true,
                    },
                )
            })
            .collect();
        let member_x25519 = records[&pubkeys[1]].x25519.unwrap();

        let local = if local_in_quorum {
            KeyPair::from_seed([1; 32])
        } else {
            KeyPair::from_seed([200; 32])
        };
        let x25519 = X25519PublicKey::from_bytes([250; 32]);
        let keys = Arc::new(ServiceNodeKeys::new(local, x25519));

        let transport = Arc::new(RecordingTransport::default());
        let relay = VoteRelay::new(
            Some(keys),
            Arc::new(FixedQuorums {
                quorum: Arc::new(Quorum::new(pubkeys)),
                height: BlockHeight(100),
            }),
            Arc::new(MapDirectory { records }),
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::new(FixedVotePool { outcome }),
        );
        Fixture {
            relay,
            transport,
            member_x25519,
        }
    }

    fn make_vote(height: u64) -> QuorumVote {
        QuorumVote {
            version: VOTE_VERSION,
            kind: QuorumKind::Obligations,
            height: BlockHeight(height),
            group: VoterGroup::Validator,
            index_in_group: 0,
            signature: Signature::from_bytes([7; 64]),
            payload: VotePayload::StateChange {
                worker_index: 1,
                state: WorkerState::Decommission,
            },
        }
    }

    #[test]
    fn test_relay_votes_sends_to_peers() {
        let fixture = make_fixture(true, VoteOutcome::default());
        fixture.relay.relay_votes(&[make_vote(90)]);
        let sent = fixture.transport.sent.lock().unwrap();
        assert!(!sent.is_empty());
        assert!(sent.iter().all(|(_, cmd)| cmd == CMD_VOTE));
    }

    #[test]
    fn test_relay_skips_non_member() {
        let fixture = make_fixture(false, VoteOutcome::default());
        fixture.relay.relay_votes(&[make_vote(90)]);
        assert!(fixture.transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_inbound_vote_rerelayed_when_added() {
        let fixture = make_fixture(
            true,
            VoteOutcome {
                verification_failed: false,
                added_to_pool: true,
            },
        );
        let message = IncomingMessage {
            sender: fixture.member_x25519,
            from_service_node: true,
            payload: encode_vote(&make_vote(90)),
        };
        fixture.relay.handle_vote(&message);
        assert!(!fixture.transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_inbound_vote_not_rerelayed_when_known() {
        let fixture = make_fixture(true, VoteOutcome::default());
        let message = IncomingMessage {
            sender: fixture.member_x25519,
            from_service_node: true,
            payload: encode_vote(&make_vote(90)),
        };
        fixture.relay.handle_vote(&message);
        assert!(fixture.transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_inbound_vote_from_future_height_dropped() {
        let fixture = make_fixture(
            true,
            VoteOutcome {
                verification_failed: false,
                added_to_pool: true,
            },
        );
        let message = IncomingMessage {
            sender: fixture.member_x25519,
            from_service_node: true,
            payload: encode_vote(&make_vote(101)),
        };
        fixture.relay.handle_vote(&message);
        assert!(fixture.transport.sent.lock().unwrap().is_empty());
    }
}
