//! Wire encoding for blink quorum commands.

pub mod bt;

mod blink;
mod vote;

pub use blink::{
    BlinkReply, BlinkSignatures, BlinkSubmission, PendingSignature, CMD_BLINK, CMD_BLINK_BAD,
    CMD_BLINK_GOOD, CMD_BLINK_NOSTART, CMD_BLINK_SIGN, CMD_VOTE,
};
pub use bt::{BtDict, BtValue, WireError, MAX_MESSAGE_SIZE};
pub use vote::{decode_vote, encode_vote};
