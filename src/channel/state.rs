//! Channel state and handler registry

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::events::{MessageKind, PushFrame};

/// Connection lifecycle of a push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ChannelState {
    /// A connection attempt is running or a connection is live
    pub fn is_active(&self) -> bool {
        !matches!(self, ChannelState::Disconnected)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// Callback invoked for every frame of one kind
pub type Handler = Arc<dyn Fn(&PushFrame) + Send + Sync>;

/// Token returned by `on`, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Handlers per message kind, kept in registration order
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    next_id: u64,
    handlers: HashMap<MessageKind, Vec<(HandlerId, Handler)>>,
}

impl HandlerRegistry {
    pub fn register(&mut self, kind: MessageKind, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    /// Returns false if the handler was not registered
    pub fn unregister(&mut self, kind: &MessageKind, id: HandlerId) -> bool {
        let Some(list) = self.handlers.get_mut(kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(kind);
        }
        removed
    }

    /// Handlers for a kind, cloned so they can run without holding the lock
    pub fn handlers_for(&self, kind: &MessageKind) -> Vec<Handler> {
        self.handlers
            .get(kind)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}
