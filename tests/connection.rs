//! Socket client against a local TCP server

use std::io::{Read, Write};
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;

use bolt_core::bolt::{BoltError, ErrorKind, Request, ResponsePipeline, BOLT_MAGIC};
use bolt_core::driver::metrics::{ConnectionPoolListener, MetricsRegistry, NoopPoolListener};
use bolt_core::driver::{ConnectionConfig, ConnectionState, SocketClient};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const PROPOSAL: [u8; 20] = [
    0x60, 0x60, 0xB0, 0x17, // magic
    0, 0, 0, 4, 0, 0, 0, 3, 0, 0, 0, 2, 0, 0, 0, 1,
];

const SUCCESS: [u8; 7] = [0x00, 0x03, 0xB1, 0x70, 0xA0, 0x00, 0x00];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_for(port: u16) -> ConnectionConfig {
    ConnectionConfig::new(&format!("bolt://127.0.0.1:{}", port)).unwrap()
}

#[test]
fn test_server_close_after_handshake() {
    init_tracing();
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut proposal = [0u8; 20];
        stream.read_exact(&mut proposal).unwrap();
        stream.write_all(&[0, 0, 0, 2]).unwrap();
        proposal
    });

    let mut client = SocketClient::new(&config_for(port)).unwrap();
    let protocol = client.connect().unwrap();
    assert_eq!(protocol.version(), 2);

    let proposal = server.join().unwrap();
    assert_eq!(proposal, PROPOSAL);
    assert_eq!(&proposal[..4], &BOLT_MAGIC);

    let mut pipeline = ResponsePipeline::new();
    pipeline.expect(1);
    let err = client.receive(&mut pipeline).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(client.state(), ConnectionState::Closed);

    // 두 번째 종료는 아무 일도 하지 않는다
    client.stop();
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_server_close_after_handshake_async() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut proposal = [0u8; 20];
        stream.read_exact(&mut proposal).await.unwrap();
        stream.write_all(&[0, 0, 0, 2]).await.unwrap();
        proposal
    });

    let mut client = SocketClient::new(&config_for(port)).unwrap();
    let protocol = client.connect_async().await.unwrap();
    assert_eq!(protocol.version(), 2);
    assert_eq!(server.await.unwrap(), PROPOSAL);

    let mut pipeline = ResponsePipeline::new();
    pipeline.expect(1);
    let err = client.receive_async(&mut pipeline).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(!client.is_open());

    client.stop_async().await;
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_request_response_async() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut proposal = [0u8; 20];
        stream.read_exact(&mut proposal).await.unwrap();
        stream.write_all(&[0, 0, 0, 4]).await.unwrap();

        // RESET + PULL
        let mut requests = [0u8; 12];
        stream.read_exact(&mut requests).await.unwrap();
        stream.write_all(&SUCCESS).await.unwrap();
        stream.write_all(&SUCCESS).await.unwrap();

        // GOODBYE
        let mut goodbye = [0u8; 6];
        stream.read_exact(&mut goodbye).await.unwrap();
        (requests, goodbye)
    });

    let registry = MetricsRegistry::default();
    let connection_metrics = registry.create_connection_listener("bolt://127.0.0.1");
    let mut client = SocketClient::new(&config_for(port))
        .unwrap()
        .with_clock(registry.clock())
        .with_connection_listener(connection_metrics.clone());

    client.connect_async().await.unwrap();
    client
        .send_async(&[&Request::Reset, &Request::PullAll])
        .await
        .unwrap();

    let mut pipeline = ResponsePipeline::new();
    pipeline.expect(2);
    client.receive_async(&mut pipeline).await.unwrap();
    assert_eq!(pipeline.messages().len(), 2);

    client.close_async().await;
    let (requests, goodbye) = server.await.unwrap();
    assert_eq!(
        requests,
        [0x00, 0x02, 0xB0, 0x0F, 0x00, 0x00, 0x00, 0x02, 0xB0, 0x3F, 0x00, 0x00]
    );
    assert_eq!(goodbye, [0x00, 0x02, 0xB0, 0x02, 0x00, 0x00]);

    assert_eq!(connection_metrics.connected(), 1);
    assert_eq!(connection_metrics.connecting(), 0);
}

#[test]
fn test_http_endpoint_is_rejected() {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut proposal = [0u8; 20];
        stream.read_exact(&mut proposal).unwrap();
        stream.write_all(b"HTTP").unwrap();
    });

    let mut client = SocketClient::new(&config_for(port)).unwrap();
    let err = client.connect().unwrap_err();
    server.join().unwrap();

    assert!(matches!(err, BoltError::Handshake(_)));
    assert_eq!(err.kind(), ErrorKind::HandshakeMismatch);
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[test]
fn test_refused_connection_stays_unopened() {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let pool_listener: Arc<dyn ConnectionPoolListener> = Arc::new(NoopPoolListener);
    let mut client = SocketClient::new(&config_for(port))
        .unwrap()
        .with_pool_listener(pool_listener);

    let err = client.connect().unwrap_err();
    assert!(matches!(err, BoltError::ConnectFailed { .. }));
    assert!(err.is_retryable());
    assert_eq!(client.state(), ConnectionState::Unopened);

    client.dispose();
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[test]
fn test_unknown_configured_version() {
    let config = ConnectionConfig::builder("bolt://127.0.0.1:7687")
        .unwrap()
        .with_protocol_versions(vec![0x0105])
        .build();

    assert!(SocketClient::new(&config).is_err());
}

#[test]
fn test_silent_server_hits_read_timeout() {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut proposal = [0u8; 20];
        stream.read_exact(&mut proposal).unwrap();
        stream.write_all(&[0, 0, 0, 4]).unwrap();
        // 응답 없이 대기
        std::thread::sleep(std::time::Duration::from_millis(500));
    });

    let config = ConnectionConfig::builder(&format!("bolt://127.0.0.1:{}", port))
        .unwrap()
        .with_read_timeout(std::time::Duration::from_millis(50))
        .build();
    let mut client = SocketClient::new(&config).unwrap();
    client.connect().unwrap();
    client.send(&[&Request::Reset]).unwrap();

    let mut pipeline = ResponsePipeline::new();
    pipeline.expect(1);
    let err = client.receive(&mut pipeline).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(client.state(), ConnectionState::Closed);

    server.join().unwrap();
}
