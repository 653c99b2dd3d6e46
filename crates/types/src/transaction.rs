//! Opaque transaction envelope.
//!
//! The protocol treats transactions as byte blobs identified by their
//! content hash. Structural parsing here is deliberately shallow; deep
//! validation (inputs, amounts, double spends) belongs to the mempool
//! collaborator.

use crate::hash::Hash;

/// Upper bound on a serialized transaction, matching the transport's
/// per-message limit.
pub const MAX_TX_SIZE: usize = 256 * 1024;

/// Errors from parsing a transaction blob.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxParseError {
    #[error("transaction blob is empty")]
    Empty,

    #[error("transaction blob is {0} bytes, over the {MAX_TX_SIZE} byte limit")]
    TooLarge(usize),
}

/// A parsed transaction: the serialized bytes plus their content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    blob: Vec<u8>,
    hash: Hash,
}

impl Transaction {
    /// Parse a serialized transaction, computing its hash.
    pub fn from_blob(blob: Vec<u8>) -> Result<Self, TxParseError> {
        if blob.is_empty() {
            return Err(TxParseError::Empty);
        }
        if blob.len() > MAX_TX_SIZE {
            return Err(TxParseError::TooLarge(blob.len()));
        }
        let hash = Hash::from_bytes(&blob);
        Ok(Transaction { blob, hash })
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    pub fn size(&self) -> usize {
        self.blob.len()
    }
}
