//! Client-facing duplex channel

use std::io;

use async_trait::async_trait;

/// Read half of a client channel
#[async_trait]
pub trait ClientSource: Send {
    /// Next message from the client as raw bytes.
    ///
    /// Returns `None` once the client has closed the channel.
    async fn recv(&mut self) -> Option<io::Result<Vec<u8>>>;
}

/// Write half of a client channel
#[async_trait]
pub trait ClientSink: Send {
    /// Forward terminal output
    async fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Send a human readable notice (setup failures)
    async fn notify(&mut self, text: &str) -> io::Result<()>;

    async fn close(&mut self) -> io::Result<()>;
}

/// A channel that can be split into independently owned halves
pub trait ClientChannel: Send {
    fn split(self) -> (Box<dyn ClientSource>, Box<dyn ClientSink>);
}
