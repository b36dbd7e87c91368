//! Real-time fan-out channel.
//!
//! An explicitly owned broadcast service, constructed once at startup and
//! injected into every handler that publishes. The signal is content-free:
//! subscribers treat it purely as "re-fetch now". Publishing never blocks
//! on subscriber availability, and sessions that connect after a signal
//! simply miss it; they perform their own initial fetch.

use tokio::sync::broadcast;

/// The single event pushed to connected sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    /// Board state changed; clients should re-fetch.
    Updated,
}

/// Fan-out handle. Cloning shares the underlying channel.
#[derive(Debug, Clone)]
pub struct BoardEvents {
    sender: broadcast::Sender<BoardEvent>,
}

impl BoardEvents {
    /// Create a fan-out channel. `capacity` bounds unread events per
    /// subscriber; a lagging subscriber skips ahead, which is fine since
    /// coalesced signals still mean "re-fetch".
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Best-effort "board changed" signal to every current subscriber.
    /// A send with no subscribers is not an error.
    pub fn broadcast_changed(&self) {
        let delivered = self.sender.send(BoardEvent::Updated).unwrap_or(0);
        tracing::debug!("Broadcast board update to {} sessions", delivered);
    }

    /// Subscribe a new session. Only events published after this call are
    /// observed.
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.sender.subscribe()
    }

    /// Number of currently connected subscribers.
    pub fn session_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BoardEvents {
    fn default() -> Self {
        Self::new(64)
    }
}
