//! Named command registry.
//!
//! The transport delivers `(command, sender, payload)` triples; the
//! dispatcher decodes the payload and routes it to the registered handler.
//! Commands are either public (any authenticated remote) or quorum-only
//! (verified service nodes). Registration happens once at startup, after
//! which the dispatcher is shared immutably across worker threads.

use blink_types::X25519PublicKey;
use blink_wire::{bt, BtValue};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Who may invoke a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAccess {
    /// Any remote, service node or not.
    Public,
    /// Verified service nodes only.
    QuorumOnly,
}

/// A decoded inbound command.
pub struct IncomingMessage {
    /// Transport identity of the sender.
    pub sender: X25519PublicKey,
    /// Whether the transport authenticated the sender as a service node.
    pub from_service_node: bool,
    /// The decoded payload dict.
    pub payload: BtValue,
}

type CommandHandler = Box<dyn Fn(&IncomingMessage) + Send + Sync>;

struct CommandEntry {
    access: CommandAccess,
    handler: CommandHandler,
}

/// Registry of named command handlers.
#[derive(Default)]
pub struct CommandDispatcher {
    commands: HashMap<&'static str, CommandEntry>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command any remote may send.
    pub fn register_public(
        &mut self,
        name: &'static str,
        handler: impl Fn(&IncomingMessage) + Send + Sync + 'static,
    ) {
        self.register(name, CommandAccess::Public, handler);
    }

    /// Register a command accepted only from verified service nodes.
    pub fn register_quorum(
        &mut self,
        name: &'static str,
        handler: impl Fn(&IncomingMessage) + Send + Sync + 'static,
    ) {
        self.register(name, CommandAccess::QuorumOnly, handler);
    }

    fn register(
        &mut self,
        name: &'static str,
        access: CommandAccess,
        handler: impl Fn(&IncomingMessage) + Send + Sync + 'static,
    ) {
        let replaced = self.commands.insert(
            name,
            CommandEntry {
                access,
                handler: Box::new(handler),
            },
        );
        debug_assert!(replaced.is_none(), "command {name} registered twice");
    }

    /// Decode and dispatch a raw inbound message. Malformed payloads and
    /// unauthorized senders are logged and dropped; nothing propagates back
    /// over the transport from here.
    pub fn dispatch_raw(
        &self,
        command: &str,
        sender: X25519PublicKey,
        from_service_node: bool,
        data: &[u8],
    ) {
        let payload = match bt::decode(data) {
            Ok(payload) => payload,
            Err(error) => {
                info!(command, sender = %sender, %error, "dropping undecodable message");
                return;
            }
        };
        self.dispatch(
            command,
            IncomingMessage {
                sender,
                from_service_node,
                payload,
            },
        );
    }

    /// Dispatch an already-decoded message.
    pub fn dispatch(&self, command: &str, message: IncomingMessage) {
        let Some(entry) = self.commands.get(command) else {
            debug!(command, sender = %message.sender, "unknown command");
            return;
        };
        if entry.access == CommandAccess::QuorumOnly && !message.from_service_node {
            warn!(command, sender = %message.sender, "quorum command from non-service-node");
            return;
        }
        (entry.handler)(&message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sender() -> X25519PublicKey {
        X25519PublicKey::from_bytes([5; 32])
    }

    #[test]
    fn test_dispatch_routes_to_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let mut dispatcher = CommandDispatcher::new();
        dispatcher.register_public("blink", move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.dispatch_raw("blink", sender(), false, b"de");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_quorum_command_requires_service_node() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let mut dispatcher = CommandDispatcher::new();
        dispatcher.register_quorum("vote", move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.dispatch_raw("vote", sender(), false, b"de");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        dispatcher.dispatch_raw("vote", sender(), true, b"de");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_payload_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let mut dispatcher = CommandDispatcher::new();
        dispatcher.register_public("blink", move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.dispatch_raw("blink", sender(), false, b"d1:x");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_command_ignored() {
        let dispatcher = CommandDispatcher::new();
        dispatcher.dispatch_raw("nonsense", sender(), true, b"de");
    }
}
