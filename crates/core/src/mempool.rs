//! Mempool collaborator trait.

use blink_types::{BlockHeight, Transaction};

/// What the mempool decided about a candidate blink tx.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MempoolVerdict {
    /// The tx passed full validation and was (or already is) accepted.
    pub approved: bool,
    /// The tx was already present when this call arrived.
    pub already_in_mempool: bool,
}

/// The external transaction pool performing deep tx validation.
///
/// Implementations must be thread-safe, and concurrent calls for the same tx
/// must be idempotent (report `already_in_mempool` rather than failing).
pub trait BlinkMempool: Send + Sync {
    fn add_blink(&self, tx: &Transaction, height: BlockHeight) -> MempoolVerdict;
}
