//! Blink fast-finality protocol core.
//!
//! Confirms transactions in seconds by collecting signed approvals from a
//! dedicated pair of service-node subquorums instead of waiting for a block:
//!
//! - [`BlinkTx`]: per-transaction signature slots and verdict derivation
//! - [`BlinkCache`]: in-flight blink state keyed by `(height, tx hash)`
//! - [`BlinkHandler`]: the quorum-member protocol pipeline
//! - [`BlinkSubmitter`]: client-side submission with a verdict future
//! - [`register_core_commands`]: binds everything to the command dispatcher
//!
//! Chain state, the service node registry, the mempool, and the socket
//! layer stay behind the collaborator traits in `blink_quorumnet` and
//! [`BlinkMempool`].

mod cache;
mod config;
mod handler;
mod init;
mod mempool;
mod submit;
mod tx;

pub use cache::BlinkCache;
pub use config::{BlinkConfig, MAX_ACTIVE_PROMISES};
pub use handler::{get_blink_quorums, BlinkHandler, QuorumLookupError};
pub use init::register_core_commands;
pub use mempool::{BlinkMempool, MempoolVerdict};
pub use submit::{BlinkResult, BlinkResultFuture, BlinkSubmitter, BlinkVerdict};
pub use tx::{BlinkTx, SignatureOutcome, SignatureStatus};
