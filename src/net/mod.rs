//! Server session link: outbound client events, inbound replies via the bus.

pub mod loopback;
pub mod protocol;
pub mod ws;

use protocol::ClientEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("cannot connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("cannot encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("server link is closed")]
    ChannelClosed,
}

/// Outbound half of the server session.
///
/// Replies never come back through this trait; they arrive later as
/// `SessionEvent::Server` on the session event queue.
pub trait ServerLink {
    fn send(&mut self, event: ClientEvent) -> Result<(), NetError>;
}

/// Link that records everything sent, for tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct RecordingLink {
    sent: std::rc::Rc<std::cell::RefCell<Vec<ClientEvent>>>,
    closed: std::rc::Rc<std::cell::Cell<bool>>,
}

#[cfg(test)]
impl RecordingLink {
    pub fn sent(&self) -> Vec<ClientEvent> {
        self.sent.borrow().clone()
    }

    pub fn clear(&self) {
        self.sent.borrow_mut().clear();
    }

    /// Every later send fails as if the connection dropped.
    pub fn close(&self) {
        self.closed.set(true);
    }
}

#[cfg(test)]
impl ServerLink for RecordingLink {
    fn send(&mut self, event: ClientEvent) -> Result<(), NetError> {
        if self.closed.get() {
            return Err(NetError::ChannelClosed);
        }
        self.sent.borrow_mut().push(event);
        Ok(())
    }
}
