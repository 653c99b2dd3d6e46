//! Client-side blink submission and response aggregation.
//!
//! [`BlinkSubmitter`] sends a candidate tx to a handful of randomly chosen
//! quorum members (the entry points) and resolves a future once a strict
//! majority of them agree on a verdict. The submitter only ever hears from
//! the entry points it chose, which is sound: an entry point replies
//! `bl_good` only after observing `BLINK_MIN_VOTES` independently verified
//! approvals per subquorum, so majority-of-contacted inherits the quorum's
//! guarantee.

use crate::config::BlinkConfig;
use crate::handler::get_blink_quorums;
use blink_quorumnet::{IncomingMessage, NodeDirectory, QuorumSource, SendKind, Transport};
use blink_types::{Hash, PublicKey, Transaction, X25519PublicKey};
use blink_wire::{bt, BlinkReply, BlinkSubmission, CMD_BLINK};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Terminal outcome of a blink submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkResult {
    Accepted,
    Rejected,
    Timeout,
}

/// Outcome plus a human-readable reason (empty on acceptance).
pub type BlinkVerdict = (BlinkResult, String);

/// Future resolving to the quorum's verdict on a submitted tx.
pub struct BlinkResultFuture {
    inner: oneshot::Receiver<BlinkVerdict>,
}

impl BlinkResultFuture {
    fn resolved(verdict: BlinkVerdict) -> Self {
        let (sender, receiver) = oneshot::channel();
        // The receiver is held right here; the send cannot fail.
        let _ = sender.send(verdict);
        BlinkResultFuture { inner: receiver }
    }

    /// Block until the verdict arrives. For synchronous callers; must not
    /// be used inside an async runtime.
    pub fn wait(self) -> BlinkVerdict {
        self.inner
            .blocking_recv()
            .unwrap_or_else(|_| (BlinkResult::Rejected, "submission dropped".to_string()))
    }

    /// The verdict, if already resolved. Does not block.
    pub fn try_take(&mut self) -> Option<BlinkVerdict> {
        self.inner.try_recv().ok()
    }
}

impl Future for BlinkResultFuture {
    type Output = BlinkVerdict;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|result| {
            result.unwrap_or_else(|_| (BlinkResult::Rejected, "submission dropped".to_string()))
        })
    }
}

enum ResponseClass {
    Nostart,
    Bad,
    Good,
}

struct PendingSubmission {
    tx_hash: Hash,
    sender: Mutex<Option<oneshot::Sender<BlinkVerdict>>>,
    expires_at: Instant,
    remote_count: u32,
    nostart_count: AtomicU32,
    bad_count: AtomicU32,
    good_count: AtomicU32,
}

impl PendingSubmission {
    /// Resolve the promise exactly once. Returns whether this call did it.
    fn resolve(&self, verdict: BlinkVerdict) -> bool {
        let Some(sender) = self.sender.lock().expect("mutex poisoned").take() else {
            return false;
        };
        // A dropped receiver just means the caller stopped waiting.
        let _ = sender.send(verdict);
        true
    }
}

/// Tracks outstanding blink submissions by tag and aggregates entry-point
/// responses into a single verdict.
pub struct BlinkSubmitter {
    quorums: Arc<dyn QuorumSource>,
    directory: Arc<dyn NodeDirectory>,
    transport: Arc<dyn Transport>,
    config: BlinkConfig,
    pending: RwLock<HashMap<u64, PendingSubmission>>,
}

impl BlinkSubmitter {
    pub fn new(
        quorums: Arc<dyn QuorumSource>,
        directory: Arc<dyn NodeDirectory>,
        transport: Arc<dyn Transport>,
        config: BlinkConfig,
    ) -> Self {
        BlinkSubmitter {
            quorums,
            directory,
            transport,
            config,
            pending: RwLock::new(HashMap::new()),
        }
    }

    /// Submit a tx for blink approval.
    ///
    /// The returned future resolves with the quorum verdict, a refusal
    /// reason, or a timeout after [`BlinkConfig::submit_timeout`].
    pub fn submit_blink(&self, tx_blob: Vec<u8>) -> BlinkResultFuture {
        let tx = match Transaction::from_blob(tx_blob) {
            Ok(tx) => tx,
            Err(error) => {
                info!(%error, "rejecting blink submission");
                return BlinkResultFuture::resolved((
                    BlinkResult::Rejected,
                    "Could not parse transaction data".to_string(),
                ));
            }
        };

        let height = self.quorums.current_height();
        let (quorums, checksum) =
            match get_blink_quorums(self.quorums.as_ref(), height, None) {
                Ok(result) => result,
                Err(error) => {
                    info!(%error, "cannot submit blink tx");
                    return BlinkResultFuture::resolved((BlinkResult::Rejected, error.to_string()));
                }
            };

        // Candidate entry points: every member of either subquorum that is
        // active and has published transport details.
        let candidates: HashSet<PublicKey> = quorums
            .iter()
            .flat_map(|q| q.validators.iter().copied())
            .collect();
        let mut remotes: Vec<(X25519PublicKey, String)> = candidates
            .iter()
            .filter_map(|pubkey| {
                let record = self.directory.resolve(pubkey)?;
                match record.reachable() {
                    Some((x25519, endpoint)) => Some((x25519, endpoint.to_string())),
                    None => {
                        debug!(peer = %pubkey, "not including unreachable blink candidate");
                        None
                    }
                }
            })
            .collect();
        debug!(
            candidates = candidates.len(),
            reachable = remotes.len(),
            "selected blink entry point candidates"
        );
        if remotes.is_empty() {
            return BlinkResultFuture::resolved((
                BlinkResult::Rejected,
                "No blink quorum entry points are currently reachable".to_string(),
            ));
        }

        let mut rng = rand::thread_rng();
        remotes.shuffle(&mut rng);
        remotes.truncate(self.config.submit_fanout);

        let (sender, receiver) = oneshot::channel();
        let tag = {
            let now = Instant::now();
            let mut pending = self.pending.write().expect("RwLock poisoned");
            Self::sweep_expired_locked(&mut pending, now);

            if pending.values().any(|p| p.tx_hash == tx.hash()) {
                return BlinkResultFuture::resolved((
                    BlinkResult::Rejected,
                    "Transaction was already submitted".to_string(),
                ));
            }
            if pending.len() >= self.config.max_active_submissions {
                warn!(active = pending.len(), "too many outstanding blink submissions");
                return BlinkResultFuture::resolved((
                    BlinkResult::Rejected,
                    "Node is busy, try again later".to_string(),
                ));
            }

            // A random tag keeps concurrent submissions unlinkable; zero is
            // reserved for "no response expected".
            let mut tag: u64 = rng.gen();
            while tag == 0 || pending.contains_key(&tag) {
                tag = rng.gen();
            }
            pending.insert(
                tag,
                PendingSubmission {
                    tx_hash: tx.hash(),
                    sender: Mutex::new(Some(sender)),
                    expires_at: now + self.config.submit_timeout,
                    remote_count: remotes.len() as u32,
                    nostart_count: AtomicU32::new(0),
                    bad_count: AtomicU32::new(0),
                    good_count: AtomicU32::new(0),
                },
            );
            tag
        };

        let payload = bt::encode(
            &BlinkSubmission {
                tag,
                height,
                checksum,
                tx_blob: tx.blob().to_vec(),
                tx_hash: tx.hash(),
            }
            .to_bt(),
        );
        for (x25519, endpoint) in remotes {
            info!(peer = %x25519, %endpoint, "relaying blink tx to entry point");
            self.transport
                .send(&x25519, CMD_BLINK, &payload, SendKind::Strong { endpoint });
        }

        BlinkResultFuture { inner: receiver }
    }

    /// Resolve and drop every submission whose deadline has passed. Runs
    /// lazily on each submission; callers with long idle stretches should
    /// invoke it periodically.
    pub fn sweep_expired(&self) {
        let mut pending = self.pending.write().expect("RwLock poisoned");
        Self::sweep_expired_locked(&mut pending, Instant::now());
    }

    fn sweep_expired_locked(pending: &mut HashMap<u64, PendingSubmission>, now: Instant) {
        pending.retain(|tag, entry| {
            if entry.expires_at <= now {
                debug!(tag, "blink submission timed out");
                entry.resolve((BlinkResult::Timeout, "Blink quorum timeout".to_string()));
                false
            } else {
                true
            }
        });
    }

    /// Number of submissions still awaiting a verdict.
    pub fn pending_count(&self) -> usize {
        self.pending.read().expect("RwLock poisoned").len()
    }

    /// Handle `bl_nostart`: an entry point refused to start the blink.
    pub fn handle_nostart(&self, message: &IncomingMessage) {
        let reply = match BlinkReply::from_bt(&message.payload) {
            Ok(reply) => reply,
            Err(error) => {
                info!(%error, "bad blink not-started response");
                return;
            }
        };
        let Some(error) = reply.error else {
            info!("blink not-started response carried no reason");
            return;
        };
        info!(%error, "received no-start blink response");
        self.common_response(reply.tag, ResponseClass::Nostart, (BlinkResult::Rejected, error));
    }

    /// Handle `bl_bad`: enough of the quorum rejected the tx.
    pub fn handle_bad(&self, message: &IncomingMessage) {
        let reply = match BlinkReply::from_bt(&message.payload) {
            Ok(reply) => reply,
            Err(error) => {
                info!(%error, "bad blink failure response");
                return;
            }
        };
        info!("received blink failure response");
        self.common_response(
            reply.tag,
            ResponseClass::Bad,
            (
                BlinkResult::Rejected,
                "Transaction rejected by quorum".to_string(),
            ),
        );
    }

    /// Handle `bl_good`: enough of the quorum approved the tx.
    pub fn handle_good(&self, message: &IncomingMessage) {
        let reply = match BlinkReply::from_bt(&message.payload) {
            Ok(reply) => reply,
            Err(error) => {
                info!(%error, "bad blink success response");
                return;
            }
        };
        info!("received blink success response");
        self.common_response(
            reply.tag,
            ResponseClass::Good,
            (BlinkResult::Accepted, String::new()),
        );
    }

    /// Count one response of the given class; resolve the promise once a
    /// strict majority of the contacted entry points lands in one class.
    fn common_response(&self, tag: u64, class: ResponseClass, verdict: BlinkVerdict) {
        let resolved = {
            let pending = self.pending.read().expect("RwLock poisoned");
            let Some(entry) = pending.get(&tag) else {
                debug!(tag, "blink response for unknown or already-resolved tag");
                return;
            };
            let counter = match class {
                ResponseClass::Nostart => &entry.nostart_count,
                ResponseClass::Bad => &entry.bad_count,
                ResponseClass::Good => &entry.good_count,
            };
            let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if count > entry.remote_count / 2 {
                entry.resolve(verdict)
            } else {
                false
            }
        };
        if resolved {
            let mut pending = self.pending.write().expect("RwLock poisoned");
            pending.remove(&tag);
        }
    }
}
