//! Reload broadcast registry.
//!
//! Tracks the outbound channel of every connected live-reload client and
//! fans out reload notifications. The registry is shared between the
//! WebSocket handler (register/unregister), the reload API, and the rebuild
//! trigger (broadcast), so all mutation goes through a single lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use uuid::Uuid;

/// Queue depth per client. A client that falls this far behind is dropped.
const CHANNEL_CAPACITY: usize = 16;

/// Notification asking a client to reload the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReloadSignal;

/// Identifier of one connected client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(Uuid);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Sending half of a client's reload channel.
#[derive(Clone, Debug)]
pub struct ReloadChannel {
    id: ChannelId,
    sender: mpsc::Sender<ReloadSignal>,
}

impl ReloadChannel {
    /// Open a new channel with a fresh id.
    ///
    /// The receiver yields `None` once the registry has dropped the channel.
    #[must_use]
    pub fn open() -> (Self, mpsc::Receiver<ReloadSignal>) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let channel = Self {
            id: ChannelId(Uuid::new_v4()),
            sender,
        };
        (channel, receiver)
    }

    /// Channel identifier.
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }
}

/// Set of live client channels.
#[derive(Debug, Default)]
pub struct ReloadRegistry {
    channels: Mutex<HashMap<ChannelId, mpsc::Sender<ReloadSignal>>>,
}

impl ReloadRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChannelId, mpsc::Sender<ReloadSignal>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a channel. Registering the same channel twice is a no-op.
    pub fn register(&self, channel: ReloadChannel) {
        self.lock().entry(channel.id).or_insert(channel.sender);
    }

    /// Remove a channel. Unknown ids are ignored.
    pub fn unregister(&self, id: ChannelId) {
        self.lock().remove(&id);
    }

    /// Number of registered channels.
    #[must_use]
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Send a reload signal to every registered channel.
    ///
    /// Channels whose send fails (client gone, or queue full) are removed.
    /// A failure on one channel does not affect delivery to the others.
    ///
    /// Returns the number of channels targeted, i.e. the registry size at the
    /// moment the broadcast started.
    pub fn broadcast_reload(&self) -> usize {
        let mut channels = self.lock();
        let targeted = channels.len();

        channels.retain(|id, sender| match sender.try_send(ReloadSignal) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(channel = %id, error = %e, "Dropping live reload client");
                false
            }
        });

        tracing::debug!(targeted, remaining = channels.len(), "Reload broadcast");
        targeted
    }
}
