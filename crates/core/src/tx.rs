//! Per-transaction blink state.
//!
//! A [`BlinkTx`] tracks one candidate transaction's signature slots across
//! the two subquorums and derives the verdict from them. It is shared
//! between the protocol handler, the cache, and every relay path touching
//! the same tx, so slot state lives behind a reader/writer lock: status
//! inspection takes the read side, slot insertion and verdict-edge sampling
//! take the write side. Signature verification never happens under either.

use blink_types::{
    blink_vote_message, BlockHeight, Hash, Signature, Transaction, BLINK_MIN_VOTES,
    NUM_BLINK_SUBQUORUMS,
};
use blink_wire::PendingSignature;
use std::fmt::Write as _;
use std::sync::RwLock;
use tracing::warn;

/// State of one signature slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    None,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Empty,
    Signed { approval: bool, signature: Signature },
}

impl Slot {
    fn status(&self) -> SignatureStatus {
        match self {
            Slot::Empty => SignatureStatus::None,
            Slot::Signed { approval: true, .. } => SignatureStatus::Approved,
            Slot::Signed { approval: false, .. } => SignatureStatus::Rejected,
        }
    }
}

/// Result of a batch slot insertion, with the verdict sampled on both sides
/// of it inside the same write-lock critical section. The `previously_*` /
/// now pair is what makes verdict emission fire exactly once across
/// concurrent signature batches.
#[derive(Debug)]
pub struct SignatureOutcome {
    /// Signatures that actually landed in an empty slot.
    pub accepted: Vec<PendingSignature>,
    pub previously_approved: bool,
    pub previously_rejected: bool,
    pub approved: bool,
    pub rejected: bool,
}

/// A candidate transaction with its per-subquorum signature slots.
pub struct BlinkTx {
    height: BlockHeight,
    tx: Transaction,
    slots: RwLock<[Vec<Slot>; NUM_BLINK_SUBQUORUMS]>,
}

impl BlinkTx {
    /// Create blink state for `tx` authorized at `height`, with one slot per
    /// validator of each subquorum.
    pub fn new(
        height: BlockHeight,
        tx: Transaction,
        subquorum_sizes: [usize; NUM_BLINK_SUBQUORUMS],
    ) -> Self {
        BlinkTx {
            height,
            tx,
            slots: RwLock::new(subquorum_sizes.map(|size| vec![Slot::Empty; size])),
        }
    }

    pub fn height(&self) -> BlockHeight {
        self.height
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn tx_hash(&self) -> Hash {
        self.tx.hash()
    }

    /// The message a quorum member signs to approve (or reject) this tx.
    /// The approval bit is part of the hash, so the two cannot be swapped.
    pub fn signing_hash(&self, approval: bool) -> Hash {
        blink_vote_message(self.height, &self.tx.hash(), approval)
    }

    /// Slot state at the given coordinates; `None` for invalid coordinates.
    pub fn signature_status(&self, subquorum: u8, position: i32) -> Option<SignatureStatus> {
        let slots = self.slots.read().expect("RwLock poisoned");
        let row = slots.get(subquorum as usize)?;
        let slot = row.get(usize::try_from(position).ok()?)?;
        Some(slot.status())
    }

    /// Signature stored at the given coordinates, with its approval bit.
    pub fn signature_at(&self, subquorum: u8, position: i32) -> Option<(bool, Signature)> {
        let slots = self.slots.read().expect("RwLock poisoned");
        let row = slots.get(subquorum as usize)?;
        match row.get(usize::try_from(position).ok()?)? {
            Slot::Empty => None,
            Slot::Signed {
                approval,
                signature,
            } => Some((*approval, *signature)),
        }
    }

    /// Store a signature whose validity the caller has already checked.
    /// Returns `false` if the slot was filled first by someone else; a slot
    /// never changes once set.
    pub fn add_prechecked_signature(
        &self,
        subquorum: u8,
        position: i32,
        approval: bool,
        signature: Signature,
    ) -> bool {
        let mut slots = self.slots.write().expect("RwLock poisoned");
        Self::insert_locked(&mut slots, subquorum, position, approval, signature)
    }

    fn insert_locked(
        slots: &mut [Vec<Slot>; NUM_BLINK_SUBQUORUMS],
        subquorum: u8,
        position: i32,
        approval: bool,
        signature: Signature,
    ) -> bool {
        let Some(row) = slots.get_mut(subquorum as usize) else {
            return false;
        };
        let Some(slot) = usize::try_from(position).ok().and_then(|p| row.get_mut(p)) else {
            return false;
        };
        match slot {
            Slot::Empty => {
                *slot = Slot::Signed {
                    approval,
                    signature,
                };
                true
            }
            Slot::Signed { .. } => false,
        }
    }

    /// Drop signatures with invalid coordinates or an already-filled slot.
    /// One read-lock pass; the cheap pre-filter before verification.
    pub fn filter_new_signatures(&self, sigs: Vec<PendingSignature>) -> Vec<PendingSignature> {
        let slots = self.slots.read().expect("RwLock poisoned");
        sigs.into_iter()
            .filter(|sig| {
                let Some(row) = slots.get(sig.subquorum as usize) else {
                    warn!(subquorum = sig.subquorum, "invalid blink signature: bad subquorum");
                    return false;
                };
                let Some(slot) = usize::try_from(sig.position)
                    .ok()
                    .and_then(|p| row.get(p))
                else {
                    warn!(
                        subquorum = sig.subquorum,
                        position = sig.position,
                        "invalid blink signature: subquorum position is invalid"
                    );
                    return false;
                };
                matches!(slot, Slot::Empty)
            })
            .collect()
    }

    /// Insert a batch of verified signatures under one write lock, sampling
    /// the verdict before and after.
    pub fn record_signatures(&self, sigs: Vec<PendingSignature>) -> SignatureOutcome {
        let mut slots = self.slots.write().expect("RwLock poisoned");
        let (previously_approved, previously_rejected) = Self::verdict_locked(&slots);

        let mut accepted = Vec::with_capacity(sigs.len());
        for sig in sigs {
            // A losing race here means another batch filled the slot between
            // our read-side filter and now; drop it.
            if Self::insert_locked(
                &mut slots,
                sig.subquorum,
                sig.position,
                sig.approval,
                sig.signature,
            ) {
                accepted.push(sig);
            }
        }

        let (approved, rejected) = Self::verdict_locked(&slots);
        SignatureOutcome {
            accepted,
            previously_approved,
            previously_rejected,
            approved,
            rejected,
        }
    }

    fn verdict_locked(slots: &[Vec<Slot>; NUM_BLINK_SUBQUORUMS]) -> (bool, bool) {
        let mut approved = true;
        let mut rejected = false;
        for row in slots {
            let approvals = row
                .iter()
                .filter(|s| s.status() == SignatureStatus::Approved)
                .count();
            let rejections = row
                .iter()
                .filter(|s| s.status() == SignatureStatus::Rejected)
                .count();
            approved &= approvals >= BLINK_MIN_VOTES;
            // Once this many slots reject, the subquorum can no longer
            // reach BLINK_MIN_VOTES approvals.
            rejected |= rejections > row.len().saturating_sub(BLINK_MIN_VOTES);
        }
        (approved, rejected)
    }

    /// Approved iff every subquorum holds at least `BLINK_MIN_VOTES`
    /// approvals. Monotone: once true, stays true.
    pub fn approved(&self) -> bool {
        Self::verdict_locked(&self.slots.read().expect("RwLock poisoned")).0
    }

    /// Rejected iff some subquorum can no longer reach `BLINK_MIN_VOTES`
    /// approvals. Monotone, and mutually exclusive with [`approved`].
    ///
    /// [`approved`]: BlinkTx::approved
    pub fn rejected(&self) -> bool {
        Self::verdict_locked(&self.slots.read().expect("RwLock poisoned")).1
    }

    /// Compact slot rendering for debug logs: `[A - R …] [ … ]` per
    /// subquorum.
    pub fn signature_summary(&self) -> String {
        let slots = self.slots.read().expect("RwLock poisoned");
        let mut out = String::new();
        for (qi, row) in slots.iter().enumerate() {
            if qi > 0 {
                out.push(' ');
            }
            out.push('[');
            for (i, slot) in row.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                let c = match slot.status() {
                    SignatureStatus::None => '-',
                    SignatureStatus::Approved => 'A',
                    SignatureStatus::Rejected => 'R',
                };
                let _ = write!(out, "{c}");
            }
            out.push(']');
        }
        out
    }
}

impl std::fmt::Debug for BlinkTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlinkTx")
            .field("height", &self.height)
            .field("tx_hash", &self.tx.hash())
            .field("slots", &self.signature_summary())
            .finish()
    }
}
