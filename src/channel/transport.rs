//! Outbound event delivery.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::ChannelError;

/// One event on the channel: a namespaced name and a JSON detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    /// Namespaced event name.
    pub event: String,
    /// JSON payload.
    pub detail: String,
}

/// A destination for channel events.
///
/// The engine emits `ready` and `state` through one; the bridge emits
/// commands through another. Implement it over the page's event dispatch in
/// a real host.
///
/// # Example
///
/// ```
/// use page_audio::{ChannelError, Transport};
/// use async_trait::async_trait;
///
/// struct PrintTransport;
///
/// #[async_trait]
/// impl Transport for PrintTransport {
///     fn name(&self) -> &str {
///         "print"
///     }
///
///     async fn emit(&self, event: &str, detail: &str) -> Result<(), ChannelError> {
///         println!("{event}: {detail}");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Delivers one event.
    async fn emit(&self, event: &str, detail: &str) -> Result<(), ChannelError>;
}

/// A transport that forwards events to a tokio mpsc channel.
///
/// # Example
///
/// ```
/// use page_audio::{ChannelMessage, ChannelTransport};
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::channel::<ChannelMessage>(64);
/// let transport = ChannelTransport::new(tx);
/// ```
pub struct ChannelTransport {
    name: String,
    sender: mpsc::Sender<ChannelMessage>,
}

impl ChannelTransport {
    /// Creates a transport over the given sender.
    pub fn new(sender: mpsc::Sender<ChannelMessage>) -> Self {
        Self {
            name: "channel".to_string(),
            sender,
        }
    }

    /// Creates a transport with a custom name.
    pub fn with_name(name: impl Into<String>, sender: mpsc::Sender<ChannelMessage>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn emit(&self, event: &str, detail: &str) -> Result<(), ChannelError> {
        self.sender
            .send(ChannelMessage {
                event: event.to_string(),
                detail: detail.to_string(),
            })
            .await
            .map_err(|_| ChannelError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_channel_transport_sends_messages() {
        let (tx, mut rx) = mpsc::channel::<ChannelMessage>(10);
        let transport = ChannelTransport::new(tx);

        transport.emit("p:t:state", "{}").await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, "p:t:state");
        assert_eq!(received.detail, "{}");
    }

    #[tokio::test]
    async fn test_channel_transport_closed() {
        let (tx, rx) = mpsc::channel::<ChannelMessage>(10);
        let transport = ChannelTransport::new(tx);
        drop(rx);

        let result = transport.emit("p:t:ready", "{}").await;
        assert!(matches!(result, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn test_channel_transport_custom_name() {
        let (tx, _rx) = mpsc::channel::<ChannelMessage>(10);
        let transport = ChannelTransport::with_name("to-bridge", tx);
        assert_eq!(transport.name(), "to-bridge");
    }

    #[test]
    fn test_transport_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Arc<dyn Transport>>();
    }
}
