//! MJPEG server behavior over real TCP sockets: wire framing, routing,
//! client limits, and isolation between sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use uvc_mjpeg_rs::camera::{ConnectionState, StateCell};
use uvc_mjpeg_rs::frame::Frame;
use uvc_mjpeg_rs::router::FrameRouter;
use uvc_mjpeg_rs::server::mjpeg::{part_header, RESPONSE_PREAMBLE};
use uvc_mjpeg_rs::server::{ServerConfig, StreamServer};
use uvc_mjpeg_rs::stats::PipelineStats;

struct Harness {
    router: Arc<FrameRouter>,
    stats: Arc<PipelineStats>,
    addr: SocketAddr,
    // Dropping the cell would close the state channel under the server.
    _state: StateCell,
}

async fn start_server(config: ServerConfig) -> Harness {
    let stats = Arc::new(PipelineStats::new());
    let router = Arc::new(FrameRouter::new(stats.clone()));
    let state = StateCell::new();
    state.set(ConnectionState::Connected).unwrap();
    state.set(ConnectionState::Streaming).unwrap();

    let config = config.bind("127.0.0.1:0".parse().unwrap());
    let server = StreamServer::bind(config, router.clone(), state.view(), stats.clone())
        .await
        .unwrap();
    let addr = server.local_addr();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    Harness {
        router,
        stats,
        addr,
        _state: state,
    }
}

async fn open_stream(addr: SocketAddr, path: &str) -> TcpStream {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {} HTTP/1.1\r\nHost: camera\r\n\r\n", path);
    socket.write_all(request.as_bytes()).await.unwrap();
    socket
}

async fn read_exactly(socket: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(Duration::from_secs(5), socket.read_exact(&mut buf))
        .await
        .expect("read timed out")
        .expect("peer closed early");
    buf
}

/// Wait for the server-side session tasks to register their queues.
async fn wait_for_subscribers(router: &FrameRouter, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while router.subscriber_count() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscriber never registered");
}

#[tokio::test]
async fn stream_response_is_byte_exact_multipart() {
    let h = start_server(ServerConfig::default()).await;
    let mut client = open_stream(h.addr, "/stream").await;

    let preamble = read_exactly(&mut client, RESPONSE_PREAMBLE.len()).await;
    assert_eq!(preamble, RESPONSE_PREAMBLE);

    wait_for_subscribers(&h.router, 1).await;

    let payload = b"\xff\xd8fake jpeg\xff\xd9";
    h.router
        .dispatch(&Frame::from_bytes(1, Bytes::from_static(payload)));

    let mut expected = part_header(payload.len());
    expected.extend_from_slice(payload);
    expected.extend_from_slice(b"\r\n");

    let part = read_exactly(&mut client, expected.len()).await;
    assert_eq!(part, expected);

    // Session accounting counts frame payload bytes. The counter is
    // bumped just after the socket write, so give the session task a
    // moment to get there.
    assert_eq!(h.stats.snapshot().sessions_opened, 1);
    tokio::time::timeout(Duration::from_secs(5), async {
        while h.stats.snapshot().bytes_sent < payload.len() as u64 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("bytes_sent never recorded");
    assert_eq!(h.stats.snapshot().bytes_sent, payload.len() as u64);
}

#[tokio::test]
async fn root_path_serves_the_same_stream() {
    let h = start_server(ServerConfig::default()).await;
    let mut client = open_stream(h.addr, "/").await;

    let preamble = read_exactly(&mut client, RESPONSE_PREAMBLE.len()).await;
    assert_eq!(preamble, RESPONSE_PREAMBLE);
}

#[tokio::test]
async fn unknown_path_gets_404_and_close() {
    let h = start_server(ServerConfig::default()).await;
    let mut client = open_stream(h.addr, "/snapshot").await;

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 404"), "got: {}", text);
}

#[tokio::test]
async fn non_get_method_is_rejected() {
    let h = start_server(ServerConfig::default()).await;
    let mut client = TcpStream::connect(h.addr).await.unwrap();
    client
        .write_all(b"POST /stream HTTP/1.1\r\nHost: camera\r\n\r\n")
        .await
        .unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 405"), "got: {}", text);
}

#[tokio::test]
async fn connections_past_the_limit_are_refused() {
    let h = start_server(ServerConfig::default().max_clients(1)).await;

    let mut first = open_stream(h.addr, "/stream").await;
    let _ = read_exactly(&mut first, RESPONSE_PREAMBLE.len()).await;

    // Second client is dropped without a response. The write may fail
    // with a reset if the server closes the socket first.
    let mut second = TcpStream::connect(h.addr).await.unwrap();
    let _ = second
        .write_all(b"GET /stream HTTP/1.1\r\nHost: camera\r\n\r\n")
        .await;
    let mut buf = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(5), second.read_to_end(&mut buf))
        .await
        .unwrap();
    // Either a clean EOF or a reset; never any response bytes.
    match result {
        Ok(n) => assert_eq!(n, 0),
        Err(_) => assert!(buf.is_empty()),
    }
}

#[tokio::test]
async fn one_client_disconnecting_does_not_stall_the_other() {
    let h = start_server(ServerConfig::default().frame_wait_timeout(Duration::from_millis(100)))
        .await;

    let mut leaver = open_stream(h.addr, "/stream").await;
    let mut stayer = open_stream(h.addr, "/stream").await;
    read_exactly(&mut leaver, RESPONSE_PREAMBLE.len()).await;
    read_exactly(&mut stayer, RESPONSE_PREAMBLE.len()).await;
    wait_for_subscribers(&h.router, 2).await;

    // Keep frames flowing while clients come and go.
    let router = h.router.clone();
    let feeder = tokio::spawn(async move {
        let payload = Bytes::from_static(b"\xff\xd8payload\xff\xd9");
        for seq in 0.. {
            router.dispatch(&Frame::from_bytes(seq, payload.clone()));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    let part_len = {
        let payload_len = b"\xff\xd8payload\xff\xd9".len();
        part_header(payload_len).len() + payload_len + 2
    };
    read_exactly(&mut leaver, part_len).await;
    read_exactly(&mut stayer, part_len).await;

    drop(leaver);

    // The abandoned session is detected and its queue pruned.
    tokio::time::timeout(Duration::from_secs(5), async {
        while h.router.subscriber_count() > 1 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("dead session never pruned");

    // The surviving client keeps receiving frames.
    read_exactly(&mut stayer, part_len).await;
    feeder.abort();
}
