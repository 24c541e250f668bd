//! Session lifecycle signal
//!
//! The host subscribes once and routes the user back to sign-in when it sees
//! [`SessionEvent::Ended`]. Many requests can fail on the same dead session;
//! the latch makes sure the host hears about it once.

use std::sync::atomic::{AtomicBool, Ordering};

use mintflow_common::error::ClassifiedError;
use tokio::sync::broadcast;
use tracing::info;

const SESSION_CHANNEL_CAPACITY: usize = 16;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEndReason {
    /// The refresh endpoint rejected the refresh token or could not be reached.
    RefreshFailed(ClassifiedError),
    /// A freshly refreshed access token was still refused with 401.
    Rejected(ClassifiedError),
    /// A refresh was needed but no refresh token was stored.
    MissingRefreshToken,
    /// The user signed out.
    SignedOut,
}

/// Broadcast to every [`SessionEvents::subscribe`] receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Credentials from a sign-in were stored.
    Started,
    /// The session is over and the user must sign in again.
    Ended { reason: SessionEndReason },
}

/// Session lifecycle broadcaster with an at-most-once `Ended` latch.
#[derive(Debug)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
    active: AtomicBool,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    /// Create an inactive session signal.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        Self { sender, active: AtomicBool::new(false) }
    }

    /// Receive every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Whether a session is running and its end has not been announced.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Arm the latch without announcing anything (session restored from disk).
    pub(crate) fn resume(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    pub(crate) fn started(&self) {
        self.active.store(true, Ordering::SeqCst);
        // No subscribers is fine.
        let _ = self.sender.send(SessionEvent::Started);
    }

    /// Announce the end of the session. Returns whether this call emitted.
    pub(crate) fn ended(&self, reason: SessionEndReason) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        info!(?reason, "session ended");
        let _ = self.sender.send(SessionEvent::Ended { reason });
        true
    }
}
