use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use henkan_client::{Transport, TransportError, UnixSocketTransport};
use henkan_protocol::{
    CommandType, Input, Output, RequestFrame, ResponseFrame, SessionId, PRODUCT_VERSION,
    PROTOCOL_VERSION,
};
use pretty_assertions::assert_eq;

fn socket_path(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("henkan-transport-{}-{}", tag, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("henkan.sock");
    let _ = std::fs::remove_file(&path);
    path
}

/// Serves `replies` lines, one per request, on a single connection.
fn serve(listener: UnixListener, replies: Vec<String>) -> thread::JoinHandle<Vec<RequestFrame>> {
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut writer = stream.try_clone().unwrap();
        let mut reader = BufReader::new(stream);
        let mut seen = Vec::new();
        for reply in replies {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 {
                break;
            }
            seen.push(RequestFrame::from_json(line.trim_end()).unwrap());
            writer.write_all(reply.as_bytes()).unwrap();
            writer.flush().unwrap();
        }
        seen
    })
}

fn reply_line(id: u64) -> String {
    let frame = ResponseFrame {
        protocol_version: PROTOCOL_VERSION,
        product_version: Some(PRODUCT_VERSION.to_string()),
        pid: Some(77),
        body: Output::with_id(SessionId(id)).to_json().unwrap(),
    };
    format!("{}\n", frame.to_json().unwrap())
}

#[test]
fn test_connect_fails_without_listener() {
    let path = socket_path("absent");
    let mut transport = UnixSocketTransport::new(&path);
    assert!(!transport.connect());
    assert!(!transport.is_connected());
    assert!(matches!(
        transport.call(b"{}"),
        Err(TransportError::NotConnected)
    ));
}

#[test]
fn test_round_trips_reuse_one_stream() {
    let path = socket_path("reuse");
    let listener = UnixListener::bind(&path).unwrap();
    let server = serve(listener, vec![reply_line(1), reply_line(2)]);

    let mut transport = UnixSocketTransport::new(&path).with_timeout(Duration::from_secs(2));
    assert!(transport.connect());

    let request = Input::new(CommandType::CreateSession).to_json().unwrap();
    let first = transport.call(request.as_bytes()).unwrap();
    let second = transport.call(request.as_bytes()).unwrap();

    assert_eq!(first.protocol_version, PROTOCOL_VERSION);
    assert_eq!(first.product_version.as_deref(), Some(PRODUCT_VERSION));
    assert_eq!(first.server_pid, Some(77));
    let output = Output::from_json(std::str::from_utf8(&second.body).unwrap()).unwrap();
    assert_eq!(output.id, SessionId(2));

    let seen = server.join().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].protocol_version, PROTOCOL_VERSION);
    assert_eq!(seen[0].product_version, PRODUCT_VERSION);
    assert_eq!(Input::from_json(&seen[0].body).unwrap().kind, CommandType::CreateSession);
}

#[test]
fn test_malformed_frame_drops_connection() {
    let path = socket_path("garbage");
    let listener = UnixListener::bind(&path).unwrap();
    let server = serve(listener, vec!["not a frame\n".to_string()]);

    let mut transport = UnixSocketTransport::new(&path).with_timeout(Duration::from_secs(2));
    assert!(transport.connect());
    let err = transport.call(b"{\"type\":\"NO_OPERATION\"}").unwrap_err();

    assert!(matches!(err, TransportError::Frame(_)));
    assert!(!transport.is_connected());
    server.join().unwrap();
}

#[test]
fn test_closed_connection_is_reported() {
    let path = socket_path("closed");
    let listener = UnixListener::bind(&path).unwrap();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
    });

    let mut transport = UnixSocketTransport::new(&path).with_timeout(Duration::from_secs(2));
    assert!(transport.connect());
    let err = transport.call(b"{\"type\":\"NO_OPERATION\"}").unwrap_err();

    assert!(matches!(err, TransportError::Closed | TransportError::Io(_)));
    assert!(!transport.is_connected());
    server.join().unwrap();
}
