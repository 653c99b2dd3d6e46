//! Command registration wiring.

use crate::handler::BlinkHandler;
use crate::submit::BlinkSubmitter;
use blink_quorumnet::{CommandDispatcher, VoteRelay};
use blink_wire::{
    CMD_BLINK, CMD_BLINK_BAD, CMD_BLINK_GOOD, CMD_BLINK_NOSTART, CMD_BLINK_SIGN, CMD_VOTE,
};
use std::sync::Arc;

/// Register every protocol command on the dispatcher. Called once at
/// startup, before the transport starts delivering messages.
pub fn register_core_commands(
    dispatcher: &mut CommandDispatcher,
    handler: Arc<BlinkHandler>,
    submitter: Arc<BlinkSubmitter>,
    votes: Arc<VoteRelay>,
) {
    // Receives a relayed quorum vote.
    dispatcher.register_quorum(CMD_VOTE, {
        let votes = Arc::clone(&votes);
        move |message| votes.handle_vote(message)
    });

    // Receives a new blink tx submission from an external node, or a
    // forward from quorum members who received it from an external node.
    dispatcher.register_public(CMD_BLINK, {
        let handler = Arc::clone(&handler);
        move |message| handler.handle_blink(message)
    });

    // Tells the submitter the tx was not relayed (bad height, checksum
    // failure, …). Sent only by the entry point nodes; one refusal does not
    // mean failure unless a majority of entry points agree.
    dispatcher.register_quorum(CMD_BLINK_NOSTART, {
        let submitter = Arc::clone(&submitter);
        move |message| submitter.handle_nostart(message)
    });

    // Tells the submitter enough signed rejections accumulated that the tx
    // can no longer be accepted.
    dispatcher.register_quorum(CMD_BLINK_BAD, {
        let submitter = Arc::clone(&submitter);
        move |message| submitter.handle_bad(message)
    });

    // Tells the submitter the tx was accepted and is being broadcast.
    dispatcher.register_quorum(CMD_BLINK_GOOD, {
        let submitter = Arc::clone(&submitter);
        move |message| submitter.handle_good(message)
    });

    // Receives blink signatures between quorum members, original or
    // forwarded; new ones are propagated further by the receiver.
    dispatcher.register_quorum(CMD_BLINK_SIGN, {
        let handler = Arc::clone(&handler);
        move |message| handler.handle_blink_signatures(message)
    });
}
