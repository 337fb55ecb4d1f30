//! Tests for the client runtime against real loopback peers.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use relink_core::LogConfig;
use relink_net::{
    ClientConfig, ConnectionState, InboundQueue, NetworkError, RxWorker, TcpClient, TxWorker,
    WorkerState,
};

fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Client settings with short timers so tests finish quickly.
fn fast_config(port: u16) -> ClientConfig {
    ClientConfig::new("127.0.0.1", port)
        .connect_timeout(Duration::from_secs(2))
        .read_timeout(Duration::from_millis(100))
        .reconnect_interval(Duration::from_millis(50))
        .failure_backoff(Duration::from_millis(50))
        .tx_idle_interval(Duration::from_millis(100))
}

/// Accept one connection, giving up after `timeout`.
fn accept_within(listener: &TcpListener, timeout: Duration) -> Option<TcpStream> {
    listener.set_nonblocking(true).unwrap();
    let deadline = Instant::now() + timeout;
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false).unwrap();
                return Some(stream);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return None;
                }
                thread::sleep(Duration::from_millis(5));
            }
            Err(e) => panic!("accept failed: {e}"),
        }
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn collect(queue: &InboundQueue, expected_len: usize, timeout: Duration) -> Vec<u8> {
    let deadline = Instant::now() + timeout;
    let mut received = Vec::new();
    while received.len() < expected_len && Instant::now() < deadline {
        if let Some(chunk) = queue.pop_timeout(Duration::from_millis(50)) {
            received.extend(chunk);
        }
    }
    received
}

#[test]
fn test_connect_to_closed_port() {
    let (listener, port) = listener();
    drop(listener);

    let state = ConnectionState::new(fast_config(port));
    assert!(!state.connect());

    assert!(!state.is_connected());
    let error = state.last_error().expect("last_error set");
    assert!(!error.is_empty());
    assert!(error.contains(&format!("127.0.0.1:{port}")));
}

#[test]
fn test_client_connects_on_start() {
    let (listener, port) = listener();
    let client = TcpClient::start(fast_config(port)).unwrap();

    let _peer = accept_within(&listener, Duration::from_secs(5)).expect("client connected");
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));
    assert!(wait_until(Duration::from_secs(5), || {
        client.tx_state() == WorkerState::Connected && client.rx_state() == WorkerState::Connected
    }));
    assert_eq!(client.address(), format!("127.0.0.1:{port}"));

    assert!(client.shutdown());
    assert_eq!(client.tx_state(), WorkerState::Stopped);
    assert_eq!(client.rx_state(), WorkerState::Stopped);
}

#[test]
fn test_send_hello() {
    let (listener, port) = listener();
    let client = TcpClient::start(fast_config(port)).unwrap();
    let mut peer = accept_within(&listener, Duration::from_secs(5)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));

    assert!(client.send("hello").unwrap());

    peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut buf = [0u8; 5];
    peer.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"hello");
}

#[test]
fn test_invalid_payload_leaves_connection_alone() {
    let (listener, port) = listener();
    let client = TcpClient::start(fast_config(port)).unwrap();
    let mut peer = accept_within(&listener, Duration::from_secs(5)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));

    match client.send("caf\u{e9}") {
        Err(NetworkError::InvalidPayload { character, .. }) => assert_eq!(character, '\u{e9}'),
        other => panic!("expected InvalidPayload, got {other:?}"),
    }
    assert!(client.is_connected());

    // Nothing reached the peer.
    peer.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
    let mut buf = [0u8; 8];
    let err = peer.read(&mut buf).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut));
}

#[test]
fn test_send_while_disconnected_is_dropped() {
    let (listener, port) = listener();
    drop(listener);
    let client = TcpClient::start(fast_config(port).auto_connect(false)).unwrap();

    assert!(!client.send("lost").unwrap());
    assert!(!client.is_connected());
}

#[test]
fn test_received_chunks_arrive_in_order() {
    let (listener, port) = listener();
    let client = TcpClient::start(fast_config(port)).unwrap();
    let mut peer = accept_within(&listener, Duration::from_secs(5)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));

    for part in [&b"one,"[..], b"two,", b"three"] {
        peer.write_all(part).unwrap();
        thread::sleep(Duration::from_millis(20));
    }

    let received = collect(client.inbound(), 13, Duration::from_secs(5));
    assert_eq!(received, b"one,two,three");
}

#[test]
fn test_idle_connection_stays_up() {
    let (listener, port) = listener();
    let client = TcpClient::start(fast_config(port)).unwrap();
    let _peer = accept_within(&listener, Duration::from_secs(5)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));
    let generation = client.connection().generation();

    // Several receive timeouts pass with nothing to read.
    thread::sleep(Duration::from_millis(500));

    assert!(client.is_connected());
    assert!(client.inbound().is_empty());
    assert_eq!(client.connection().generation(), generation);
    assert!(client.last_error().is_none());
}

#[test]
fn test_peer_close_triggers_reconnect() {
    let (listener, port) = listener();
    let client = TcpClient::start(fast_config(port)).unwrap();
    let peer = accept_within(&listener, Duration::from_secs(5)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));
    assert_eq!(client.connection().generation(), 1);

    drop(peer);
    let closed_at = Instant::now();

    let mut second = accept_within(&listener, Duration::from_secs(5)).expect("client reconnected");
    assert!(closed_at.elapsed() < Duration::from_secs(3));
    assert!(wait_until(Duration::from_secs(5), || {
        client.is_connected() && client.connection().generation() == 2
    }));
    assert!(client.inbound().is_empty());

    // The new connection carries data both ways.
    assert!(client.send("again").unwrap());
    second.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut buf = [0u8; 5];
    second.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"again");
}

#[test]
fn test_worker_retries_until_peer_appears() {
    let (listener, port) = listener();
    drop(listener);

    let client = TcpClient::start(fast_config(port)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || client.last_error().is_some()));
    assert!(!client.is_connected());

    // The same port may have been taken in the meantime; skip if so.
    let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) else {
        return;
    };
    let _peer = accept_within(&listener, Duration::from_secs(5)).expect("client reconnected");
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));
    assert!(client.last_error().is_none());
}

#[test]
fn test_disconnect_stops_reconnection() {
    let (listener, port) = listener();
    let client = TcpClient::start(fast_config(port)).unwrap();
    let mut peer = accept_within(&listener, Duration::from_secs(5)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));

    client.disconnect();

    assert!(!client.is_connected());
    assert!(!client.connection().autoconnect());

    // The peer sees the close.
    peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(peer.read(&mut buf).unwrap(), 0);

    // No new connection shows up over many reconnect intervals.
    assert!(accept_within(&listener, Duration::from_millis(500)).is_none());
    assert_eq!(client.connection().generation(), 1);
    assert!(wait_until(Duration::from_secs(2), || {
        client.tx_state() == WorkerState::Disconnected
            && client.rx_state() == WorkerState::Disconnected
    }));

    // Repeated disconnects change nothing.
    client.disconnect();
    client.disconnect();
    assert!(!client.is_connected());
    assert!(!client.connection().autoconnect());
}

#[test]
fn test_manual_connect_after_disconnect() {
    let (listener, port) = listener();
    let client = TcpClient::start(fast_config(port).auto_connect(false)).unwrap();

    assert!(accept_within(&listener, Duration::from_millis(200)).is_none());
    assert!(!client.is_connected());

    assert!(client.connect());
    let _peer = accept_within(&listener, Duration::from_secs(5)).unwrap();
    assert!(client.connection().autoconnect());

    client.disconnect();
    assert!(!client.is_connected());

    assert!(client.connect());
    let _again = accept_within(&listener, Duration::from_secs(5)).unwrap();
    assert!(client.is_connected());
    assert_eq!(client.connection().generation(), 2);
}

#[test]
fn test_shutdown_is_prompt() {
    let (listener, port) = listener();
    let config = fast_config(port)
        .read_timeout(Duration::from_secs(1))
        .tx_idle_interval(Duration::from_secs(30));
    let client = TcpClient::start(config).unwrap();
    let _peer = accept_within(&listener, Duration::from_secs(5)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));

    let start = Instant::now();
    assert!(client.shutdown());
    // Bounded by the receive timeout, not the Tx idle interval.
    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(!client.shutdown());
}

#[test]
fn test_separate_workers_on_shared_state() {
    let (listener, port) = listener();
    let connection = Arc::new(ConnectionState::new(fast_config(port)));
    let inbound = InboundQueue::new();

    let tx = TxWorker::new(connection.clone()).unwrap();
    let rx = RxWorker::new(connection.clone(), Some(inbound.clone())).unwrap();
    let mut peer = accept_within(&listener, Duration::from_secs(5)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || connection.is_connected()));

    assert!(tx.send(b"ping".to_vec()).unwrap());
    let mut buf = [0u8; 4];
    peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    peer.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"ping");

    peer.write_all(b"pong").unwrap();
    assert_eq!(collect(&inbound, 4, Duration::from_secs(5)), b"pong");

    tx.stop();
    rx.stop();
    assert!(tx.join());
    assert!(rx.join());
    assert_eq!(tx.state(), WorkerState::Stopped);
    assert_eq!(rx.state(), WorkerState::Stopped);
}

#[test]
fn test_client_from_config_file() {
    let (listener, port) = listener();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.toml");
    std::fs::write(
        &path,
        format!(
            "host = \"127.0.0.1\"\nport = {port}\n\n[socket]\nread_timeout_ms = 100\n\n[reconnect]\ninterval_ms = 50\n"
        ),
    )
    .unwrap();

    let config = ClientConfig::load(&path).unwrap();
    assert_eq!(config.socket.read_timeout, Duration::from_millis(100));

    let client = TcpClient::start(config).unwrap();
    let _peer = accept_within(&listener, Duration::from_secs(5)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));
}

#[test]
fn test_client_rejects_zero_timeouts() {
    let (listener, port) = listener();

    let err = TcpClient::start(fast_config(port).read_timeout(Duration::ZERO)).unwrap_err();
    assert!(matches!(
        err,
        NetworkError::InvalidConfig { field: "socket.read_timeout_ms", .. }
    ));
    let err = TcpClient::start(fast_config(port).connect_timeout(Duration::ZERO)).unwrap_err();
    assert!(matches!(
        err,
        NetworkError::InvalidConfig { field: "socket.connect_timeout_ms", .. }
    ));

    // No worker was started, so nobody connects.
    assert!(accept_within(&listener, Duration::from_millis(200)).is_none());
}

#[test]
fn test_zero_read_timeout_in_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.toml");
    std::fs::write(&path, "host = \"127.0.0.1\"\nport = 1\n\n[socket]\nread_timeout_ms = 0\n")
        .unwrap();

    let err = ClientConfig::load(&path).unwrap_err();
    assert!(matches!(err, NetworkError::InvalidConfig { .. }));
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = ClientConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, NetworkError::ConfigIo { .. }));
}

#[test]
fn test_client_with_scoped_logging() {
    let _log = LogConfig::new("relink_net=trace")
        .ignore_env()
        .ansi(false)
        .install_scoped()
        .unwrap();

    let (listener, port) = listener();
    let state = ConnectionState::new(fast_config(port));
    assert!(state.connect());
    let _peer = accept_within(&listener, Duration::from_secs(5)).unwrap();
    state.disconnect();
    assert!(!state.is_connected());
}
