//! In-flight blink state, keyed by `(height, tx hash)`.
//!
//! The cache holds every blink tx this node has seen recently, plus
//! signatures that arrived *before* their transaction did (out-of-order
//! delivery is normal: a peer one hop closer to the submitter may relay its
//! signature faster than the tx body travels). Entries expire by height,
//! not wall clock, so a node riding out a small reorg keeps processing
//! in-flight signatures.

use crate::tx::BlinkTx;
use blink_types::{BlockHeight, Hash, X25519PublicKey};
use blink_wire::PendingSignature;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

/// Cached state for one `(height, tx hash)` pair.
#[derive(Default)]
struct CachedBlink {
    /// Present once the tx bytes are known.
    blink_tx: Option<Arc<BlinkTx>>,
    /// Signatures received before the tx, deduplicated.
    pending_sigs: BTreeSet<PendingSignature>,
    /// Set when the original submitter reached us directly; the eventual
    /// verdict is sent back to them.
    reply_tag: u64,
    reply_peer: Option<X25519PublicKey>,
}

/// Height-windowed store of in-flight blink state.
pub struct BlinkCache {
    retention_blocks: u64,
    inner: RwLock<BTreeMap<u64, HashMap<Hash, CachedBlink>>>,
}

impl BlinkCache {
    pub fn new(retention_blocks: u64) -> Self {
        BlinkCache {
            retention_blocks,
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    /// The blink tx at `(height, hash)`, if its bytes are already known.
    pub fn known_tx(&self, height: BlockHeight, hash: &Hash) -> Option<Arc<BlinkTx>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner.get(&height.0)?.get(hash)?.blink_tx.clone()
    }

    /// Record the submitter to answer for an already-known tx, if none is
    /// recorded yet. Covers the case where the tx arrived from a quorum
    /// peer before the originating node reached us.
    pub fn record_reply_target(
        &self,
        height: BlockHeight,
        hash: &Hash,
        tag: u64,
        peer: X25519PublicKey,
    ) -> bool {
        if tag == 0 {
            return false;
        }
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let Some(entry) = inner.get_mut(&height.0).and_then(|h| h.get_mut(hash)) else {
            return false;
        };
        if entry.blink_tx.is_none() || entry.reply_tag != 0 {
            return false;
        }
        entry.reply_tag = tag;
        entry.reply_peer = Some(peer);
        true
    }

    /// Look up the blink tx with its reply routing, for signature
    /// processing. `None` if the tx bytes are not yet known.
    pub fn lookup_for_signatures(
        &self,
        height: BlockHeight,
        hash: &Hash,
    ) -> Option<(Arc<BlinkTx>, u64, Option<X25519PublicKey>)> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let entry = inner.get(&height.0)?.get(hash)?;
        let btx = entry.blink_tx.clone()?;
        Some((btx, entry.reply_tag, entry.reply_peer))
    }

    /// Install a freshly parsed blink tx, draining any buffered signatures.
    ///
    /// Returns `None` if another thread installed the same tx first (the
    /// caller should stop: everything it would do has been done). Records
    /// the reply target when `tag` is non-zero.
    pub fn install(
        &self,
        current_height: BlockHeight,
        btx: Arc<BlinkTx>,
        tag: u64,
        peer: X25519PublicKey,
    ) -> Option<Vec<PendingSignature>> {
        let height = btx.height();
        let hash = btx.tx_hash();
        let mut inner = self.inner.write().expect("RwLock poisoned");
        Self::prune_locked(&mut inner, self.floor(current_height));

        let entry = inner.entry(height.0).or_default().entry(hash).or_default();
        if entry.blink_tx.is_some() {
            debug!(%height, tx_hash = %hash, "blink tx already installed");
            return None;
        }
        entry.blink_tx = Some(btx);
        if tag > 0 && entry.reply_tag == 0 {
            entry.reply_tag = tag;
            entry.reply_peer = Some(peer);
        }
        let drained: Vec<_> = std::mem::take(&mut entry.pending_sigs).into_iter().collect();
        if !drained.is_empty() {
            debug!(
                %height,
                tx_hash = %hash,
                count = drained.len(),
                "draining signatures buffered before the tx arrived"
            );
        }
        Some(drained)
    }

    /// Buffer signatures for a tx whose bytes have not arrived yet.
    pub fn buffer_signatures(
        &self,
        current_height: BlockHeight,
        height: BlockHeight,
        hash: &Hash,
        sigs: Vec<PendingSignature>,
    ) {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        Self::prune_locked(&mut inner, self.floor(current_height));
        let entry = inner.entry(height.0).or_default().entry(*hash).or_default();
        entry.pending_sigs.extend(sigs);
        trace!(
            %height,
            tx_hash = %hash,
            buffered = entry.pending_sigs.len(),
            "buffered early blink signatures"
        );
    }

    /// Number of buffered signatures for `(height, hash)`.
    pub fn pending_signature_count(&self, height: BlockHeight, hash: &Hash) -> usize {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner
            .get(&height.0)
            .and_then(|h| h.get(hash))
            .map(|e| e.pending_sigs.len())
            .unwrap_or(0)
    }

    /// Drop every entry below the retention floor for `current_height`.
    /// Called lazily on insert; also suitable for a periodic sweep.
    pub fn prune(&self, current_height: BlockHeight) {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        Self::prune_locked(&mut inner, self.floor(current_height));
    }

    fn floor(&self, current_height: BlockHeight) -> u64 {
        current_height.0.saturating_sub(self.retention_blocks)
    }

    fn prune_locked(inner: &mut BTreeMap<u64, HashMap<Hash, CachedBlink>>, floor: u64) {
        while let Some((&height, _)) = inner.first_key_value() {
            if height >= floor {
                break;
            }
            inner.remove(&height);
            trace!(height, "pruned expired blink cache entries");
        }
    }

    /// Total number of cached entries, across all heights.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner.values().map(|h| h.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blink_types::{Signature, Transaction};

    fn make_btx(height: u64, blob: &[u8]) -> Arc<BlinkTx> {
        let tx = Transaction::from_blob(blob.to_vec()).unwrap();
        Arc::new(BlinkTx::new(BlockHeight(height), tx, [10, 10]))
    }

    fn peer() -> X25519PublicKey {
        X25519PublicKey::from_bytes([9; 32])
    }

    fn sig(position: i32) -> PendingSignature {
        PendingSignature {
            approval: true,
            subquorum: 0,
            position,
            signature: Signature::from_bytes([position as u8 + 1; 64]),
        }
    }

    #[test]
    fn test_install_then_lookup() {
        let cache = BlinkCache::new(5);
        let btx = make_btx(100, b"tx1");
        let hash = btx.tx_hash();

        assert!(cache.known_tx(BlockHeight(100), &hash).is_none());
        let drained = cache.install(BlockHeight(100), Arc::clone(&btx), 7, peer());
        assert_eq!(drained, Some(vec![]));
        assert!(cache.known_tx(BlockHeight(100), &hash).is_some());

        let (_, tag, reply_peer) = cache
            .lookup_for_signatures(BlockHeight(100), &hash)
            .unwrap();
        assert_eq!(tag, 7);
        assert_eq!(reply_peer, Some(peer()));
    }

    #[test]
    fn test_double_install_detected() {
        let cache = BlinkCache::new(5);
        let btx = make_btx(100, b"tx1");
        assert!(cache
            .install(BlockHeight(100), Arc::clone(&btx), 0, peer())
            .is_some());
        assert!(cache.install(BlockHeight(100), btx, 0, peer()).is_none());
    }

    #[test]
    fn test_buffered_signatures_drain_on_install() {
        let cache = BlinkCache::new(5);
        let btx = make_btx(100, b"tx1");
        let hash = btx.tx_hash();

        // Duplicates collapse in the buffer.
        cache.buffer_signatures(BlockHeight(100), BlockHeight(100), &hash, vec![sig(1), sig(2)]);
        cache.buffer_signatures(BlockHeight(100), BlockHeight(100), &hash, vec![sig(2), sig(3)]);
        assert_eq!(cache.pending_signature_count(BlockHeight(100), &hash), 3);

        let drained = cache.install(BlockHeight(100), btx, 0, peer()).unwrap();
        assert_eq!(drained.len(), 3);
        assert_eq!(cache.pending_signature_count(BlockHeight(100), &hash), 0);
    }

    #[test]
    fn test_record_reply_target_only_once() {
        let cache = BlinkCache::new(5);
        let btx = make_btx(100, b"tx1");
        let hash = btx.tx_hash();
        cache.install(BlockHeight(100), btx, 0, peer());

        assert!(cache.record_reply_target(BlockHeight(100), &hash, 5, peer()));
        let other = X25519PublicKey::from_bytes([8; 32]);
        assert!(!cache.record_reply_target(BlockHeight(100), &hash, 6, other));

        let (_, tag, reply_peer) = cache
            .lookup_for_signatures(BlockHeight(100), &hash)
            .unwrap();
        assert_eq!((tag, reply_peer), (5, Some(peer())));
    }

    #[test]
    fn test_prune_by_height_window() {
        let cache = BlinkCache::new(5);
        let old = make_btx(100, b"old");
        let fresh = make_btx(104, b"fresh");
        cache.install(BlockHeight(104), old, 0, peer());
        cache.install(BlockHeight(104), fresh, 0, peer());
        assert_eq!(cache.len(), 2);

        // Chain advances: 100 < 110 - 5, so the old entry goes.
        cache.prune(BlockHeight(110));
        assert_eq!(cache.len(), 1);
        assert!(cache.known_tx(BlockHeight(100), &Hash::from_bytes(b"old")).is_none());
        assert!(cache.known_tx(BlockHeight(104), &Hash::from_bytes(b"fresh")).is_some());
    }
}
