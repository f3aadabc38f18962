//! The seam between the link lifecycle and whatever radio actually carries it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// A peripheral seen during one scan. Not persisted; handed once to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralRef {
    pub id: String,
    pub name: String,
}

impl PeripheralRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        PeripheralRef {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PeripheralRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Invoked with the raw payload of every notification, from the transport's
/// own task. Must not block.
pub type NotificationHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

#[async_trait]
pub trait Radio: Send + Sync {
    type Link: Link;

    /// Runs one discovery scan lasting at most `timeout` and returns every
    /// advertiser that reported a name.
    async fn scan(&self, timeout: Duration) -> Result<Vec<PeripheralRef>>;

    async fn connect(&self, peripheral: &PeripheralRef) -> Result<Self::Link>;
}

#[async_trait]
pub trait Link: Send + Sync {
    /// Subscribes to heart rate measurement notifications. `handler` runs
    /// concurrently with the caller until `unsubscribe` or `disconnect`.
    async fn subscribe(&mut self, handler: NotificationHandler) -> Result<()>;

    async fn is_connected(&self) -> Result<bool>;

    async fn unsubscribe(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;
}
