//! Terminal bridge tests

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;

use gakwaya_panel::errors::{EngineError, SessionError};
use gakwaya_panel::terminal::{TerminalBridge, TerminalOptions};

use crate::support::{memory_channel, ClientEvent, FakeEngine};

fn bridge(engine: &Arc<FakeEngine>) -> TerminalBridge {
    TerminalBridge::new(engine.clone(), TerminalOptions::default())
}

fn data_bytes(events: &[ClientEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            ClientEvent::Data(data) => Some(data.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

#[tokio::test]
async fn test_client_input_reaches_exec_intact() {
    let engine = Arc::new(FakeEngine::new());
    let (_output, mut exec_input) = engine.script_exec();
    let (channel, mut client) = memory_channel();

    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    for piece in payload.chunks(777) {
        client.input.send(Ok(piece.to_vec())).unwrap();
    }
    drop(client.input);

    let session = tokio::spawn({
        let bridge = bridge(&engine);
        async move { bridge.open("c0ffee", channel).await }
    });

    let mut received = Vec::new();
    exec_input.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, payload);

    tokio::time::timeout(Duration::from_secs(2), session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let events = client.events.recv().await;
    assert_eq!(events, Some(ClientEvent::Closed));

    let state = engine.state();
    assert_eq!(
        state.execs,
        vec![("c0ffee".to_string(), vec!["/bin/sh".to_string()])]
    );
}

#[tokio::test]
async fn test_exec_output_chunked_to_client() {
    let engine = Arc::new(FakeEngine::new());
    let (output, mut exec_input) = engine.script_exec();
    let (channel, mut client) = memory_channel();

    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 13) as u8).collect();
    output.send(Ok(payload.clone())).unwrap();
    output.send(Ok(b"$ ".to_vec())).unwrap();
    drop(output);

    let result = bridge(&engine).open("c0ffee", channel).await;
    assert!(result.is_ok());

    let events = client.drain().await;
    let sizes: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            ClientEvent::Data(data) => Some(data.len()),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![4096, 4096, 1808, 2]);

    let mut expected = payload;
    expected.extend_from_slice(b"$ ");
    assert_eq!(data_bytes(&events), expected);
    assert_eq!(events.last(), Some(&ClientEvent::Closed));

    // exec input was shut down as well
    let mut rest = Vec::new();
    exec_input.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_client_close_ends_session_promptly() {
    let engine = Arc::new(FakeEngine::new());
    // output sender kept alive: the exec never ends on its own
    let (_output, _exec_input) = engine.script_exec();
    let (channel, mut client) = memory_channel();

    let session = tokio::spawn({
        let bridge = bridge(&engine);
        async move { bridge.open("c0ffee", channel).await }
    });

    client.input.send(Ok(b"exit\n".to_vec())).unwrap();
    drop(client.input);

    let result = tokio::time::timeout(Duration::from_secs(1), session)
        .await
        .expect("session did not end after client close")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(client.events.recv().await, Some(ClientEvent::Closed));
    assert_eq!(client.events.recv().await, None);
}

#[tokio::test]
async fn test_undrained_exec_input_does_not_hold_session() {
    let engine = Arc::new(FakeEngine::new());
    // reader kept but never read: the 64 KiB pipe fills up
    let (output, _exec_input) = engine.script_exec();
    let (channel, client) = memory_channel();

    for _ in 0..64 {
        client.input.send(Ok(vec![b'x'; 4096])).unwrap();
    }

    let session = tokio::spawn({
        let bridge = bridge(&engine);
        async move { bridge.open("c0ffee", channel).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    drop(output);
    drop(client);

    let result = tokio::time::timeout(Duration::from_secs(3), session)
        .await
        .expect("session held open by a blocked exec write")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_stalled_exec_input_times_out() {
    let engine = Arc::new(FakeEngine::new());
    let (_output, _exec_input) = engine.script_exec();
    let (channel, client) = memory_channel();

    for _ in 0..64 {
        client.input.send(Ok(vec![b'x'; 4096])).unwrap();
    }

    let options = TerminalOptions {
        write_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let bridge = TerminalBridge::new(engine.clone(), options);

    let result = tokio::time::timeout(Duration::from_secs(3), bridge.open("c0ffee", channel))
        .await
        .expect("blocked exec write was not bounded");
    assert!(result.is_ok());
    drop(client);
}

#[tokio::test]
async fn test_client_read_error_counts_as_close() {
    let engine = Arc::new(FakeEngine::new());
    let (_output, _exec_input) = engine.script_exec();
    let (channel, client) = memory_channel();

    client
        .input
        .send(Err(std::io::Error::other("connection reset by peer")))
        .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        bridge(&engine).open("c0ffee", channel),
    )
    .await
    .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_exec_read_error_is_relay_error() {
    let engine = Arc::new(FakeEngine::new());
    let (output, _exec_input) = engine.script_exec();
    let (channel, mut client) = memory_channel();

    output.send(Ok(b"partial".to_vec())).unwrap();
    output
        .send(Err(EngineError::Unexpected("stream reset".to_string())))
        .unwrap();

    let result = bridge(&engine).open("c0ffee", channel).await;
    assert!(matches!(result, Err(SessionError::RelayIo(_))));

    let events = client.drain().await;
    assert_eq!(data_bytes(&events), b"partial");
    assert_eq!(events.last(), Some(&ClientEvent::Closed));
}

#[tokio::test]
async fn test_stalled_client_write_times_out() {
    let engine = Arc::new(FakeEngine::new());
    let (output, _exec_input) = engine.script_exec();
    let (channel, _client) = memory_channel();
    let channel = channel.stalling();

    output.send(Ok(b"hello".to_vec())).unwrap();

    let options = TerminalOptions {
        write_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let bridge = TerminalBridge::new(engine.clone(), options);

    let result = tokio::time::timeout(Duration::from_secs(2), bridge.open("c0ffee", channel))
        .await
        .unwrap();
    assert!(matches!(result, Err(SessionError::RelayIo(msg)) if msg.contains("timed out")));
}

#[tokio::test]
async fn test_create_exec_failure_notifies_client() {
    let engine = Arc::new(FakeEngine::new());
    engine.state().fail_create_exec = true;
    let (channel, mut client) = memory_channel();

    let result = bridge(&engine).open("missing", channel).await;
    assert!(matches!(result, Err(SessionError::CreateExec(_))));

    let events = client.drain().await;
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], ClientEvent::Notice(text) if text.contains("No such container")));
    assert_eq!(events[1], ClientEvent::Closed);
}

#[tokio::test]
async fn test_attach_failure_notifies_client() {
    let engine = Arc::new(FakeEngine::new());
    engine.state().fail_attach = true;
    let (channel, mut client) = memory_channel();

    let result = bridge(&engine).open("c0ffee", channel).await;
    assert!(matches!(result, Err(SessionError::Attach(_))));

    let events = client.drain().await;
    assert!(matches!(&events[0], ClientEvent::Notice(text) if text.contains("attach refused")));
    assert_eq!(events.last(), Some(&ClientEvent::Closed));
}

#[tokio::test]
async fn test_custom_shell() {
    let engine = Arc::new(FakeEngine::new());
    let (output, _exec_input) = engine.script_exec();
    drop(output);
    let (channel, _client) = memory_channel();

    let options = TerminalOptions {
        shell: vec!["/bin/bash".to_string(), "-l".to_string()],
        ..Default::default()
    };
    TerminalBridge::new(engine.clone(), options)
        .open("c0ffee", channel)
        .await
        .unwrap();

    assert_eq!(engine.state().execs[0].1, vec!["/bin/bash", "-l"]);
}
