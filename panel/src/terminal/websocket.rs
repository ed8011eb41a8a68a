//! WebSocket client channel

use std::io;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use crate::terminal::channel::{ClientChannel, ClientSink, ClientSource};

/// Client channel over an upgraded axum WebSocket
pub struct WsChannel {
    socket: WebSocket,
}

impl WsChannel {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl ClientChannel for WsChannel {
    fn split(self) -> (Box<dyn ClientSource>, Box<dyn ClientSink>) {
        let (sink, stream) = self.socket.split();
        (Box::new(WsSource { stream }), Box::new(WsSink { sink }))
    }
}

struct WsSource {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl ClientSource for WsSource {
    async fn recv(&mut self) -> Option<io::Result<Vec<u8>>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().as_bytes().to_vec())),
                Ok(Message::Binary(data)) => return Some(Ok(data.to_vec())),
                Ok(Message::Close(_)) => return None,
                // pings are answered by the socket itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Err(e) => return Some(Err(io::Error::other(e))),
            }
        }
    }
}

struct WsSink {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl ClientSink for WsSink {
    async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.sink
            .send(Message::Binary(data.to_vec().into()))
            .await
            .map_err(io::Error::other)
    }

    async fn notify(&mut self, text: &str) -> io::Result<()> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(io::Error::other)
    }

    async fn close(&mut self) -> io::Result<()> {
        self.sink.close().await.map_err(io::Error::other)
    }
}
