//! Inbound blink command handling.
//!
//! [`BlinkHandler`] runs on quorum members. It accepts `blink` submissions
//! (from clients or forwarded by peers), distributes them across the two
//! subquorums, signs its own approval or rejection, and accumulates
//! everyone else's signatures until the verdict flips — at which point the
//! entry points that took the original submission notify the submitter.
//!
//! A submission is relayed to peers *before* local validation: other quorum
//! members should start validating as early as possible, and the relay must
//! not depend on this node's mempool verdict. The cost is that a junk tx
//! crosses the quorum once before every member rejects it; the transport's
//! connection gating is the place to rate-limit that.

use crate::cache::BlinkCache;
use crate::config::BlinkConfig;
use crate::mempool::BlinkMempool;
use crate::tx::BlinkTx;
use blink_quorumnet::{IncomingMessage, NodeDirectory, PeerInfo, QuorumSource, SendKind, Transport};
use blink_types::{
    blink_quorum_height, quorum_checksum, BlockHeight, Hash, Quorum, QuorumKind, ServiceNodeKeys,
    Transaction, X25519PublicKey, BLINK_MIN_VOTES, BLINK_SUBQUORUM_SIZE, NUM_BLINK_SUBQUORUMS,
};
use blink_wire::{
    bt, BlinkReply, BlinkSignatures, BlinkSubmission, PendingSignature, CMD_BLINK, CMD_BLINK_BAD,
    CMD_BLINK_GOOD, CMD_BLINK_NOSTART, CMD_BLINK_SIGN,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Why a blink authorization could not be set up against the local view.
/// The rendered message is what travels back to the submitter in
/// `bl_nostart`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuorumLookupError {
    #[error("too early in blockchain to create a quorum")]
    TooEarly,

    #[error("no blink quorum at height {0}")]
    Missing(BlockHeight),

    #[error("not enough blink nodes to form a quorum")]
    BadSize,

    #[error("wrong quorum checksum: expected {expected}, received {received}")]
    ChecksumMismatch { expected: u64, received: u64 },
}

/// Fetch the two blink subquorums for an authorization height, enforce size
/// bounds, and compute the membership checksum. With `expected_checksum`
/// set, a mismatch is an error; divergent validator views between nodes thus
/// surface as a uniform refusal instead of a half-signed tx.
pub fn get_blink_quorums(
    source: &dyn QuorumSource,
    height: BlockHeight,
    expected_checksum: Option<u64>,
) -> Result<(Vec<Arc<Quorum>>, u64), QuorumLookupError> {
    let mut quorums = Vec::with_capacity(NUM_BLINK_SUBQUORUMS);
    let mut checksum: u64 = 0;
    for qi in 0..NUM_BLINK_SUBQUORUMS {
        let quorum_height =
            blink_quorum_height(height, qi).ok_or(QuorumLookupError::TooEarly)?;
        let quorum = source
            .quorum(QuorumKind::Blink, quorum_height)
            .ok_or(QuorumLookupError::Missing(quorum_height))?;
        if quorum.len() < BLINK_MIN_VOTES || quorum.len() > BLINK_SUBQUORUM_SIZE {
            return Err(QuorumLookupError::BadSize);
        }
        checksum = checksum.wrapping_add(quorum_checksum(
            &quorum.validators,
            qi * BLINK_SUBQUORUM_SIZE,
        ));
        quorums.push(quorum);
    }
    trace!(%height, checksum, "computed blink quorums");

    if let Some(received) = expected_checksum {
        if received != checksum {
            return Err(QuorumLookupError::ChecksumMismatch {
                expected: checksum,
                received,
            });
        }
    }
    Ok((quorums, checksum))
}

/// Quorum-member side of the blink protocol.
pub struct BlinkHandler {
    keys: Option<Arc<ServiceNodeKeys>>,
    quorums: Arc<dyn QuorumSource>,
    directory: Arc<dyn NodeDirectory>,
    mempool: Arc<dyn BlinkMempool>,
    transport: Arc<dyn Transport>,
    cache: BlinkCache,
    config: BlinkConfig,
}

impl BlinkHandler {
    pub fn new(
        keys: Option<Arc<ServiceNodeKeys>>,
        quorums: Arc<dyn QuorumSource>,
        directory: Arc<dyn NodeDirectory>,
        mempool: Arc<dyn BlinkMempool>,
        transport: Arc<dyn Transport>,
        config: BlinkConfig,
    ) -> Self {
        let cache = BlinkCache::new(config.cache_retention_blocks);
        BlinkHandler {
            keys,
            quorums,
            directory,
            mempool,
            transport,
            cache,
            config,
        }
    }

    /// The in-flight blink store, for periodic pruning and inspection.
    pub fn cache(&self) -> &BlinkCache {
        &self.cache
    }

    fn reply_nostart(&self, to: &X25519PublicKey, tag: u64, error: impl std::fmt::Display) {
        if tag == 0 {
            return;
        }
        let reply = BlinkReply::nostart(tag, error.to_string());
        self.transport.send(
            to,
            CMD_BLINK_NOSTART,
            &bt::encode(&reply.to_bt()),
            SendKind::Weak,
        );
    }

    /// Handle an inbound `blink` command: a tx submission from a client or a
    /// forward from another quorum member.
    pub fn handle_blink(&self, message: &IncomingMessage) {
        debug!(
            sender = %message.sender,
            service_node = message.from_service_node,
            "received a blink tx"
        );

        let Some(data) = message.payload.as_dict() else {
            info!("rejecting blink message: payload is not a dict");
            return;
        };
        // Everything before the height check is untrusted: decode failures
        // are dropped without a reply since we cannot trust the tag either.
        let tag = match bt::opt_u64(data, "!") {
            Ok(tag) => tag.unwrap_or(0),
            Err(error) => {
                info!(%error, "rejecting blink message");
                return;
            }
        };
        let height = match bt::req_u64(data, "h") {
            Ok(h) => BlockHeight(h),
            Err(error) => {
                info!(%error, "rejecting blink message");
                return;
            }
        };

        let local_height = self.quorums.current_height();
        let tolerance = self.config.height_tolerance;
        if height.0.saturating_add(tolerance) < local_height.0
            || height.0 > local_height.0.saturating_add(tolerance)
        {
            info!(%height, %local_height, "rejecting blink tx: auth height out of range");
            self.reply_nostart(&message.sender, tag, "Invalid blink authorization height");
            return;
        }
        trace!(%height, %local_height, "blink tx auth height is valid");

        let Some(hash_bytes) = data.get("#").and_then(|v| v.as_bytes()) else {
            info!("rejecting blink message: no tx hash included");
            return;
        };
        let Some(tx_hash) = Hash::from_slice(hash_bytes) else {
            info!("rejecting blink tx: invalid tx hash included in request");
            self.reply_nostart(&message.sender, tag, "Invalid transaction hash");
            return;
        };

        // The sender's precomputed hash lets us short-circuit txs we have
        // already seen; it is verified against the parsed tx below before
        // anything else trusts it.
        if self.cache.known_tx(height, &tx_hash).is_some() {
            debug!(tx_hash = %tx_hash, "already seen and forwarded this blink tx");
            if self
                .cache
                .record_reply_target(height, &tx_hash, tag, message.sender)
            {
                // The quorum relay beat the originating node here; now we
                // know who to answer.
                debug!(tag, "recorded late reply target for known blink tx");
            }
            return;
        }

        let checksum = match bt::req_u64(data, "q") {
            Ok(c) => c,
            Err(error) => {
                info!(%error, "rejecting blink message");
                return;
            }
        };
        let Some(tx_blob) = data.get("t").and_then(|v| v.as_bytes()) else {
            info!("rejecting blink tx: no tx data included in request");
            self.reply_nostart(&message.sender, tag, "No transaction included in blink request");
            return;
        };
        trace!(bytes = tx_blob.len(), "blink tx data received");

        let (quorums, checksum) =
            match get_blink_quorums(self.quorums.as_ref(), height, Some(checksum)) {
                Ok(result) => result,
                Err(error) => {
                    info!(%error, "rejecting blink tx");
                    self.reply_nostart(&message.sender, tag, error);
                    return;
                }
            };

        let Some(keys) = &self.keys else {
            info!("rejecting blink tx: this node has no service node keys");
            self.reply_nostart(
                &message.sender,
                tag,
                "Blink tx relayed to non-blink quorum member",
            );
            return;
        };

        // Exclude whoever sent it to us from the relay; they have it.
        let mut exclude = HashSet::new();
        if let Some(sender_pubkey) = self.directory.pubkey_from_x25519(&message.sender) {
            exclude.insert(sender_pubkey);
        }
        let peers = PeerInfo::compute(
            &keys.public_key(),
            &quorums,
            self.directory.as_ref(),
            true,
            exclude,
        );
        if !peers.in_any_quorum() {
            info!("rejecting blink tx: this node is not a member of the blink quorum");
            self.reply_nostart(
                &message.sender,
                tag,
                "Blink tx relayed to non-blink quorum member",
            );
            return;
        }
        trace!(subquorums = peers.my_position_count(), "found this node in the blink quorums");

        let tx = match Transaction::from_blob(tx_blob.to_vec()) {
            Ok(tx) => tx,
            Err(error) => {
                info!(%error, "rejecting blink tx: failed to parse transaction data");
                self.reply_nostart(&message.sender, tag, "Failed to parse transaction data");
                return;
            }
        };
        if tx.hash() != tx_hash {
            info!(
                claimed = %tx_hash,
                actual = %tx.hash(),
                "rejecting blink tx: submitted tx hash did not match actual tx hash"
            );
            self.reply_nostart(&message.sender, tag, "Invalid transaction hash");
            return;
        }

        // Without at least one strong peer nothing we sign can spread. This
        // only happens on a brand-new node that has not learned any peer
        // endpoints yet.
        if peers.strong_peer_count() == 0 {
            warn!("could not find connection info for any blink quorum peers; aborting blink tx");
            self.reply_nostart(
                &message.sender,
                tag,
                "No quorum peers are currently reachable",
            );
            return;
        }

        let subquorum_sizes = [quorums[0].len(), quorums[1].len()];
        let btx = Arc::new(BlinkTx::new(height, tx, subquorum_sizes));
        let Some(mut signatures) =
            self.cache
                .install(local_height, Arc::clone(&btx), tag, message.sender)
        else {
            // Raced with another delivery of the same tx; that thread owns
            // the rest of the pipeline.
            return;
        };
        trace!(tx_hash = %tx_hash, "accepted new blink tx for verification");

        // Distribute first, then validate locally: peers should not have to
        // wait on our mempool, and our peers may succeed where we fail.
        let forward = BlinkSubmission {
            tag: 0,
            height,
            checksum,
            tx_blob: tx_blob.to_vec(),
            tx_hash,
        };
        debug!(
            strong = peers.strong_peer_count(),
            opportunistic = peers.opportunistic_peer_count(),
            "relaying blink tx to quorum peers"
        );
        peers.relay_to_peers(self.transport.as_ref(), CMD_BLINK, &bt::encode(&forward.to_bt()));

        let verdict = self.mempool.add_blink(btx.tx(), height);
        info!(
            tx_hash = %tx_hash,
            approved = verdict.approved,
            "blink tx validated against the mempool"
        );
        if verdict.already_in_mempool {
            debug!(tx_hash = %tx_hash, "blink tx was already in the mempool");
        }

        // Sign every subquorum position we hold and process the whole batch
        // (our signatures plus whatever arrived before the tx did).
        let signature = keys.sign(btx.signing_hash(verdict.approved).as_bytes());
        for (qi, position) in peers.my_position().iter().enumerate() {
            if *position >= 0 {
                signatures.push(PendingSignature {
                    approval: verdict.approved,
                    subquorum: qi as u8,
                    position: *position,
                    signature,
                });
            }
        }

        self.process_signatures(&btx, &quorums, checksum, signatures, tag, Some(message.sender), None);
    }

    /// Handle an inbound `blink_sign` command: signatures relayed between
    /// quorum members.
    pub fn handle_blink_signatures(&self, message: &IncomingMessage) {
        debug!(sender = %message.sender, "received blink tx signatures");

        let msg = match BlinkSignatures::from_bt(&message.payload) {
            Ok(msg) => msg,
            Err(error) => {
                warn!(sender = %message.sender, %error, "invalid blink signature data");
                return;
            }
        };

        let (quorums, checksum) =
            match get_blink_quorums(self.quorums.as_ref(), msg.height, Some(msg.checksum)) {
                Ok(result) => result,
                Err(error) => {
                    info!(%error, "rejecting blink signatures");
                    return;
                }
            };

        match self.cache.lookup_for_signatures(msg.height, &msg.tx_hash) {
            Some((btx, reply_tag, reply_peer)) => {
                debug!(tx_hash = %msg.tx_hash, "found blink tx in local cache");
                self.process_signatures(
                    &btx,
                    &quorums,
                    checksum,
                    msg.signatures,
                    reply_tag,
                    reply_peer,
                    Some(&message.sender),
                );
            }
            None => {
                info!(tx_hash = %msg.tx_hash, "blink tx not yet known; buffering signatures");
                self.cache.buffer_signatures(
                    self.quorums.current_height(),
                    msg.height,
                    &msg.tx_hash,
                    msg.signatures,
                );
            }
        }
    }

    /// Validate, store, and relay a batch of signatures for a known blink
    /// tx, emitting the verdict to the submitter if this batch flipped it.
    ///
    /// Three phases with distinct locking: slot dedup under the read lock,
    /// cryptographic verification under no lock, insertion and verdict edge
    /// sampling under the write lock.
    #[allow(clippy::too_many_arguments)]
    fn process_signatures(
        &self,
        btx: &Arc<BlinkTx>,
        quorums: &[Arc<Quorum>],
        checksum: u64,
        signatures: Vec<PendingSignature>,
        reply_tag: u64,
        reply_peer: Option<X25519PublicKey>,
        received_from: Option<&X25519PublicKey>,
    ) {
        let Some(keys) = &self.keys else {
            return;
        };

        let signatures = btx.filter_new_signatures(signatures);
        if signatures.is_empty() {
            return;
        }

        let signatures: Vec<_> = signatures
            .into_iter()
            .filter(|sig| {
                // Coordinates survived the slot filter; re-check against the
                // quorum itself in case its size shifted under a reorg.
                let Some(signer) = quorums
                    .get(sig.subquorum as usize)
                    .and_then(|q| q.validators.get(sig.position as usize))
                    .copied()
                else {
                    return false;
                };
                let message = btx.signing_hash(sig.approval);
                let valid = signer.verify(message.as_bytes(), &sig.signature);
                if !valid {
                    warn!(
                        subquorum = sig.subquorum,
                        position = sig.position,
                        "invalid blink signature: verification failed"
                    );
                }
                valid
            })
            .collect();
        if signatures.is_empty() {
            return;
        }

        trace!(slots = %btx.signature_summary(), "existing signatures before recording");
        let outcome = btx.record_signatures(signatures);
        if outcome.accepted.is_empty() {
            return;
        }
        debug!(
            accepted = outcome.accepted.len(),
            slots = %btx.signature_summary(),
            "stored blink signatures"
        );

        // Relay what we accepted to everyone except the peer it came from;
        // anyone who already has a signature drops it on their own dedup.
        let mut exclude = HashSet::new();
        if let Some(from) = received_from {
            if let Some(sender_pubkey) = self.directory.pubkey_from_x25519(from) {
                exclude.insert(sender_pubkey);
            }
        }
        let peers = PeerInfo::compute(
            &keys.public_key(),
            quorums,
            self.directory.as_ref(),
            true,
            exclude,
        );
        debug!(
            count = outcome.accepted.len(),
            strong = peers.strong_peer_count(),
            opportunistic = peers.opportunistic_peer_count(),
            "relaying blink signatures to quorum peers"
        );
        let relay = BlinkSignatures {
            height: btx.height(),
            tx_hash: btx.tx_hash(),
            checksum,
            signatures: outcome.accepted,
        };
        peers.relay_to_peers(self.transport.as_ref(), CMD_BLINK_SIGN, &bt::encode(&relay.to_bt()));

        if reply_tag > 0 {
            if let Some(peer) = reply_peer {
                if outcome.approved && !outcome.previously_approved {
                    info!(tx_hash = %btx.tx_hash(), "blink tx is now approved; notifying originating node");
                    self.transport.send(
                        &peer,
                        CMD_BLINK_GOOD,
                        &bt::encode(&BlinkReply::verdict(reply_tag).to_bt()),
                        SendKind::Weak,
                    );
                } else if outcome.rejected && !outcome.previously_rejected {
                    info!(tx_hash = %btx.tx_hash(), "blink tx is now rejected; notifying originating node");
                    self.transport.send(
                        &peer,
                        CMD_BLINK_BAD,
                        &bt::encode(&BlinkReply::verdict(reply_tag).to_bt()),
                        SendKind::Weak,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blink_types::{Hash, KeyPair, PublicKey};
    use blink_quorumnet::NodeRecord;
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
        sent: Mutex<Vec<(X25519PublicKey, String, Vec<u8>)>>,
    }

    impl Transport for RecordingTransport {
        fn send(&self, to: &X25519PublicKey, command: &str, payload: &[u8], _kind: SendKind) {
            self.sent
                .lock()
                .unwrap()
                .push((*to, command.to_string(), payload.to_vec()));
        }
    }

    struct ApproveAll;

    impl BlinkMempool for ApproveAll {
        fn add_blink(
            &self,
            _tx: &Transaction,
            _height: BlockHeight,
        ) -> crate::mempool::MempoolVerdict {
            crate::mempool::MempoolVerdict {
                approved: true,
                already_in_mempool: false,
            }
        }
    }

    struct Fixture {
        handler: BlinkHandler,
        transport: Arc<RecordingTransport>,
        checksum: u64,
        height: BlockHeight,
        sender: X25519PublicKey,
    }

    fn make_fixture() -> Fixture {
        let keys = Arc::new(ServiceNodeKeys::new(
            KeyPair::from_seed([1; 32]),
            X25519PublicKey::from_bytes([1; 32]),
        ));
        make_fixture_with_keys(Some(keys))
    }

    fn make_fixture_with_keys(keys: Option<Arc<ServiceNodeKeys>>) -> Fixture {
        let keypairs: Vec<KeyPair> = (0..10u8).map(|i| KeyPair::from_seed([i + 1; 32])).collect();
        let pubkeys: Vec<PublicKey> = keypairs.iter().map(|k| k.public_key()).collect();
        let records: HashMap<_, _> = pubkeys
            .iter()
            .enumerate()
            .map(|(i, pk)| {
                (
                    *pk,
                    NodeRecord {
                        x25519: Some(X25519PublicKey::from_bytes([i as u8 + 1; 32])),
                        endpoint: Some(format!("tcp://10.2.0.{i}:7800")),
                        active: true,
                    },
                )
            })
            .collect();

        let quorum = Arc::new(Quorum::new(pubkeys.clone()));
        let height = BlockHeight(1000);
        let source = Arc::new(FixedQuorums {
            quorum,
            height,
        });
        let (_, checksum) = get_blink_quorums(source.as_ref(), height, None).unwrap();

        let transport = Arc::new(RecordingTransport::default());
        let handler = BlinkHandler::new(
            keys,
            source,
            Arc::new(MapDirectory { records }),
            Arc::new(ApproveAll),
            Arc::clone(&transport) as Arc<dyn Transport>,
            BlinkConfig::default(),
        );
        Fixture {
            handler,
            transport,
            checksum,
            height,
            sender: X25519PublicKey::from_bytes([99; 32]),
        }
    }

    fn submission(fixture: &Fixture, tag: u64, height: BlockHeight, checksum: u64) -> IncomingMessage {
        let blob = b"an ordinary tx".to_vec();
        let msg = BlinkSubmission {
            tag,
            height,
            checksum,
            tx_hash: Hash::from_bytes(&blob),
            tx_blob: blob,
        };
        IncomingMessage {
            sender: fixture.sender,
            from_service_node: false,
            payload: msg.to_bt(),
        }
    }

    fn nostart_error(transport: &RecordingTransport) -> Option<String> {
        let sent = transport.sent.lock().unwrap();
        sent.iter()
            .find(|(_, cmd, _)| cmd == CMD_BLINK_NOSTART)
            .map(|(_, _, payload)| {
                BlinkReply::from_bt(&bt::decode(payload).unwrap())
                    .unwrap()
                    .error
                    .unwrap()
            })
    }

    #[test]
    fn test_valid_submission_relays_and_signs() {
        let fixture = make_fixture();
        let message = submission(&fixture, 42, fixture.height, fixture.checksum);
        fixture.handler.handle_blink(&message);

        let sent = fixture.transport.sent.lock().unwrap();
        assert!(sent.iter().any(|(_, cmd, _)| cmd == CMD_BLINK));
        assert!(sent.iter().any(|(_, cmd, _)| cmd == CMD_BLINK_SIGN));

        // Our own approval landed in both subquorums (same membership).
        let btx = fixture
            .handler
            .cache()
            .known_tx(fixture.height, &Hash::from_bytes(b"an ordinary tx"))
            .unwrap();
        assert_eq!(
            btx.signature_status(0, 0),
            Some(crate::tx::SignatureStatus::Approved)
        );
        assert_eq!(
            btx.signature_status(1, 0),
            Some(crate::tx::SignatureStatus::Approved)
        );
    }

    #[test]
    fn test_height_out_of_range_replies_nostart() {
        let fixture = make_fixture();
        let message = submission(&fixture, 42, BlockHeight(997), fixture.checksum);
        fixture.handler.handle_blink(&message);
        assert_eq!(
            nostart_error(&fixture.transport).as_deref(),
            Some("Invalid blink authorization height")
        );
    }

    #[test]
    fn test_checksum_mismatch_replies_nostart() {
        let fixture = make_fixture();
        let message = submission(&fixture, 42, fixture.height, fixture.checksum ^ 1);
        fixture.handler.handle_blink(&message);
        let error = nostart_error(&fixture.transport).unwrap();
        assert!(error.starts_with("wrong quorum checksum"), "{error}");
    }

    #[test]
    fn test_hash_mismatch_replies_nostart() {
        let fixture = make_fixture();
        let msg = BlinkSubmission {
            tag: 42,
            height: fixture.height,
            checksum: fixture.checksum,
            tx_blob: b"an ordinary tx".to_vec(),
            tx_hash: Hash::from_bytes(b"a different tx"),
        };
        fixture.handler.handle_blink(&IncomingMessage {
            sender: fixture.sender,
            from_service_node: false,
            payload: msg.to_bt(),
        });
        assert_eq!(
            nostart_error(&fixture.transport).as_deref(),
            Some("Invalid transaction hash")
        );
    }

    #[test]
    fn test_keyless_node_refuses_submission() {
        let fixture = make_fixture_with_keys(None);
        let message = submission(&fixture, 42, fixture.height, fixture.checksum);
        fixture.handler.handle_blink(&message);
        assert_eq!(
            nostart_error(&fixture.transport).as_deref(),
            Some("Blink tx relayed to non-blink quorum member")
        );
    }

    #[test]
    fn test_untagged_failure_stays_silent() {
        let fixture = make_fixture();
        let message = submission(&fixture, 0, BlockHeight(990), fixture.checksum);
        fixture.handler.handle_blink(&message);
        assert!(fixture.transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_early_signatures_buffered_until_tx_arrives() {
        let fixture = make_fixture();
        let blob = b"an ordinary tx".to_vec();
        let tx_hash = Hash::from_bytes(&blob);

        // A peer's approval arrives before the tx itself.
        let signer = KeyPair::from_seed([3; 32]);
        let message_hash =
            blink_types::blink_vote_message(fixture.height, &tx_hash, true);
        let early = BlinkSignatures {
            height: fixture.height,
            tx_hash,
            checksum: fixture.checksum,
            signatures: vec![PendingSignature {
                approval: true,
                subquorum: 0,
                position: 2,
                signature: signer.sign(message_hash.as_bytes()),
            }],
        };
        fixture.handler.handle_blink_signatures(&IncomingMessage {
            sender: X25519PublicKey::from_bytes([3; 32]),
            from_service_node: true,
            payload: early.to_bt(),
        });
        assert_eq!(
            fixture
                .handler
                .cache()
                .pending_signature_count(fixture.height, &tx_hash),
            1
        );

        // The tx arrives; the buffered signature is verified and installed
        // together with our own.
        let message = submission(&fixture, 0, fixture.height, fixture.checksum);
        fixture.handler.handle_blink(&message);
        let btx = fixture
            .handler
            .cache()
            .known_tx(fixture.height, &tx_hash)
            .unwrap();
        assert_eq!(
            btx.signature_status(0, 2),
            Some(crate::tx::SignatureStatus::Approved)
        );
        assert_eq!(
            btx.signature_status(0, 0),
            Some(crate::tx::SignatureStatus::Approved)
        );
    }

    #[test]
    fn test_forged_signature_dropped() {
        let fixture = make_fixture();
        let message = submission(&fixture, 0, fixture.height, fixture.checksum);
        fixture.handler.handle_blink(&message);
        let tx_hash = Hash::from_bytes(b"an ordinary tx");

        // Signed by the wrong key for position 5.
        let impostor = KeyPair::from_seed([77; 32]);
        let message_hash =
            blink_types::blink_vote_message(fixture.height, &tx_hash, true);
        let forged = BlinkSignatures {
            height: fixture.height,
            tx_hash,
            checksum: fixture.checksum,
            signatures: vec![PendingSignature {
                approval: true,
                subquorum: 0,
                position: 5,
                signature: impostor.sign(message_hash.as_bytes()),
            }],
        };
        fixture.handler.handle_blink_signatures(&IncomingMessage {
            sender: X25519PublicKey::from_bytes([3; 32]),
            from_service_node: true,
            payload: forged.to_bt(),
        });

        let btx = fixture
            .handler
            .cache()
            .known_tx(fixture.height, &tx_hash)
            .unwrap();
        assert_eq!(btx.signature_status(0, 5), Some(crate::tx::SignatureStatus::None));
    }
}
