//! Terminal session bridge

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::engine::{ContainerEngine, ExecChannel};
use crate::errors::{EngineError, SessionError};
use crate::terminal::channel::{ClientChannel, ClientSink, ClientSource};

/// Terminal session options
#[derive(Debug, Clone)]
pub struct TerminalOptions {
    /// Command started inside the container
    pub shell: Vec<String>,

    /// Deadline for a single write to the client
    pub write_timeout: Duration,

    /// Largest chunk forwarded to the client in one message
    pub chunk_size: usize,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self {
            shell: vec!["/bin/sh".to_string()],
            write_timeout: Duration::from_secs(10),
            chunk_size: 4096,
        }
    }
}

type ExecInput = Pin<Box<dyn AsyncWrite + Send>>;
type ExecOutput = BoxStream<'static, Result<Vec<u8>, EngineError>>;

pub struct TerminalBridge {
    engine: Arc<dyn ContainerEngine>,
    options: TerminalOptions,
}

impl TerminalBridge {
    pub fn new(engine: Arc<dyn ContainerEngine>, options: TerminalOptions) -> Self {
        Self { engine, options }
    }

    /// Run a terminal session in `container_id` over `channel`.
    ///
    /// Resolves once the session has ended and both sides are closed.
    pub async fn open<C: ClientChannel>(
        &self,
        container_id: &str,
        channel: C,
    ) -> Result<(), SessionError> {
        let (source, mut sink) = channel.split();

        let exec_id = match self
            .engine
            .create_exec(container_id, &self.options.shell)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                let err = SessionError::CreateExec(e.to_string());
                report_setup_failure(sink.as_mut(), &err).await;
                return Err(err);
            }
        };

        let ExecChannel { output, input } = match self.engine.attach_exec(&exec_id).await {
            Ok(channel) => channel,
            Err(e) => {
                let err = SessionError::Attach(e.to_string());
                report_setup_failure(sink.as_mut(), &err).await;
                return Err(err);
            }
        };

        info!("Terminal session {} opened in {}", exec_id, container_id);

        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let to_exec = tokio::spawn(client_to_exec(
            source,
            input,
            self.options.write_timeout,
            shutdown_tx.subscribe(),
            shutdown_tx.clone(),
        ));
        let to_client = tokio::spawn(exec_to_client(
            output,
            sink,
            self.options.clone(),
            shutdown_tx.subscribe(),
            shutdown_tx.clone(),
        ));

        let (to_exec, to_client) = tokio::join!(to_exec, to_client);

        if let Ok(mut input) = to_exec {
            shutdown_input(&mut input, self.options.write_timeout).await;
        }

        let result = match to_client {
            Ok((mut sink, result)) => {
                if let Err(e) = sink.close().await {
                    debug!("Closing client channel: {}", e);
                }
                result
            }
            Err(e) => Err(SessionError::RelayIo(format!("relay task failed: {}", e))),
        };

        info!("Terminal session {} closed", exec_id);
        result
    }
}

async fn report_setup_failure(sink: &mut dyn ClientSink, err: &SessionError) {
    warn!("Terminal setup failed: {}", err);
    if let Err(e) = sink.notify(&err.to_string()).await {
        debug!("Failed to notify client: {}", e);
    }
    let _ = sink.close().await;
}

async fn client_to_exec(
    mut source: Box<dyn ClientSource>,
    mut input: ExecInput,
    write_timeout: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
    shutdown_tx: broadcast::Sender<()>,
) -> ExecInput {
    loop {
        let message = tokio::select! {
            _ = shutdown_rx.recv() => break,
            message = source.recv() => message,
        };

        match message {
            Some(Ok(data)) => {
                if data.is_empty() {
                    continue;
                }
                // the exec may stop draining its input; never outlive the session
                let written = tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Session ended during exec input write");
                        break;
                    }
                    written = tokio::time::timeout(
                        write_timeout,
                        write_input(&mut input, &data),
                    ) => written,
                };
                match written {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!("Write to exec input failed: {}", e);
                        break;
                    }
                    Err(_) => {
                        warn!("Write to exec input timed out after {:?}", write_timeout);
                        break;
                    }
                }
            }
            Some(Err(e)) => {
                debug!("Client read failed, treating as close: {}", e);
                break;
            }
            None => {
                debug!("Client closed terminal channel");
                break;
            }
        }
    }

    // EOF to the shell
    shutdown_input(&mut input, write_timeout).await;
    let _ = shutdown_tx.send(());
    input
}

async fn write_input(input: &mut ExecInput, data: &[u8]) -> std::io::Result<()> {
    input.write_all(data).await?;
    input.flush().await
}

async fn shutdown_input(input: &mut ExecInput, deadline: Duration) {
    match tokio::time::timeout(deadline, input.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Closing exec input: {}", e),
        Err(_) => debug!("Closing exec input timed out after {:?}", deadline),
    }
}

async fn exec_to_client(
    mut output: ExecOutput,
    mut sink: Box<dyn ClientSink>,
    options: TerminalOptions,
    mut shutdown_rx: broadcast::Receiver<()>,
    shutdown_tx: broadcast::Sender<()>,
) -> (Box<dyn ClientSink>, Result<(), SessionError>) {
    let chunk_size = options.chunk_size.max(1);

    let result = 'relay: loop {
        let item = tokio::select! {
            _ = shutdown_rx.recv() => break Ok(()),
            item = output.next() => item,
        };

        let bytes = match item {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                break Err(SessionError::RelayIo(format!("exec read failed: {}", e)));
            }
            None => {
                debug!("Exec output reached EOF");
                break Ok(());
            }
        };

        for chunk in bytes.chunks(chunk_size) {
            match tokio::time::timeout(options.write_timeout, sink.send(chunk)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    break 'relay Err(SessionError::RelayIo(format!(
                        "client write failed: {}",
                        e
                    )));
                }
                Err(_) => {
                    break 'relay Err(SessionError::RelayIo(format!(
                        "client write timed out after {:?}",
                        options.write_timeout
                    )));
                }
            }
        }
    };

    if let Err(e) = &result {
        warn!("Terminal relay ended: {}", e);
    }
    let _ = shutdown_tx.send(());
    (sink, result)
}
