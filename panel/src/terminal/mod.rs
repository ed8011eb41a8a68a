//! Interactive terminal sessions inside running containers.
//!
//! A session relays raw bytes between a client channel (a browser
//! WebSocket in production) and a TTY exec session in the container.

pub mod bridge;
pub mod channel;
pub mod websocket;

pub use bridge::{TerminalBridge, TerminalOptions};
pub use channel::{ClientChannel, ClientSink, ClientSource};
