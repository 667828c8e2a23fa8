use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use schemagate_schema::{OfflineFetcher, SchemaResolver, ValidationEngine};
use schemagate_service::{ConnectionStrategy, Dispatcher, Server, ServiceConfig};
use schemagate_transport::{CancellationToken, Listener, TcpSocketListener};
use serde_json::{json, Value};

const PREFIX: &str = "https://delk73.github.io/synesthetic-schemas/schema/0.7.3/";

fn seed(root: &Path) -> ServiceConfig {
    let schemas = root.join("schemas");
    let examples = root.join("examples");
    std::fs::create_dir_all(&schemas).unwrap();
    std::fs::create_dir_all(&examples).unwrap();
    std::fs::write(
        schemas.join("synesthetic-asset.schema.json"),
        r#"{"type":"object","required":["name"],"properties":{"name":{"type":"string"}}}"#,
    )
    .unwrap();
    ServiceConfig {
        poll_interval: Duration::from_millis(20),
        shutdown_grace: Duration::from_millis(500),
        ..ServiceConfig::new(schemas, examples)
    }
}

fn server(config: &ServiceConfig) -> Server {
    let engine = ValidationEngine::with_resolver(SchemaResolver::with_fetcher(
        config.resolver.clone(),
        Arc::new(OfflineFetcher),
    ));
    Server::new(Arc::new(Dispatcher::from_parts(config, engine, None)), config)
}

fn spawn<L>(
    server: Server,
    listener: L,
    strategy: ConnectionStrategy,
) -> (CancellationToken, JoinHandle<u64>)
where
    L: Listener + 'static,
{
    let token = CancellationToken::new();
    let loop_token = token.clone();
    let handle = thread::spawn(move || {
        server
            .serve_listener(&listener, strategy, &loop_token)
            .unwrap()
    });
    (token, handle)
}

struct Client<S: std::io::Read + Write> {
    reader: BufReader<S>,
}

impl<S: std::io::Read + Write> Client<S> {
    fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
        }
    }

    fn send(&mut self, line: &str) {
        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes()).unwrap();
        stream.write_all(b"\n").unwrap();
        stream.flush().unwrap();
    }

    fn recv(&mut self) -> Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        serde_json::from_str(&line).unwrap()
    }

    fn call(&mut self, id: u64, method: &str, params: Value) -> Value {
        self.send(
            &json!({"protocolVersion": "2.0", "id": id, "method": method, "params": params})
                .to_string(),
        );
        self.recv()
    }
}

fn tcp_client(addr: std::net::SocketAddr) -> Client<TcpStream> {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    Client::new(stream)
}

#[test]
fn tcp_round_trip_and_validation() {
    let dir = tempfile::tempdir().unwrap();
    let config = seed(dir.path());
    let listener = TcpSocketListener::bind("127.0.0.1", 0).unwrap();
    let addr = listener.local_addr();
    let (token, handle) = spawn(server(&config), listener, ConnectionStrategy::PerConnection);

    let mut client = tcp_client(addr);
    let listed = client.call(1, "list_schemas", json!({}));
    assert_eq!(listed["id"], 1);
    assert_eq!(listed["protocolVersion"], "2.0");
    assert_eq!(listed["result"]["ok"], true);
    assert_eq!(listed["result"]["schemas"][0]["name"], "synesthetic-asset");

    let asset = json!({"$schema": format!("{PREFIX}synesthetic-asset.schema.json"), "name": 3});
    let invalid = client.call(2, "validate_asset", json!({ "asset": asset }));
    assert_eq!(invalid["result"]["reason"], "validation_failed");
    assert_eq!(invalid["result"]["errors"][0]["path"], "/name");

    drop(client);
    token.cancel();
    assert!(handle.join().unwrap() >= 1);
}

#[test]
fn oversized_frame_gets_null_id_and_connection_continues() {
    let dir = tempfile::tempdir().unwrap();
    let config = seed(dir.path());
    let listener = TcpSocketListener::bind("127.0.0.1", 0).unwrap();
    let addr = listener.local_addr();
    let (token, handle) = spawn(server(&config), listener, ConnectionStrategy::PerConnection);

    let mut client = tcp_client(addr);
    let huge = format!(
        r#"{{"protocolVersion":"2.0","id":7,"method":"validate_asset","params":{{"asset":"{}"}}}}"#,
        "x".repeat(1024 * 1024 + 16)
    );
    client.send(&huge);
    let rejected = client.recv();
    assert_eq!(rejected["id"], Value::Null);
    assert_eq!(rejected["result"]["ok"], false);
    assert_eq!(rejected["result"]["reason"], "validation_failed");
    assert_eq!(rejected["result"]["errors"][0]["msg"], "payload_too_large");

    let after = client.call(8, "list_schemas", json!({}));
    assert_eq!(after["id"], 8);

    drop(client);
    token.cancel();
    handle.join().unwrap();
}

#[test]
fn concurrent_tcp_clients_are_served_independently() {
    let dir = tempfile::tempdir().unwrap();
    let config = seed(dir.path());
    let listener = TcpSocketListener::bind("127.0.0.1", 0).unwrap();
    let addr = listener.local_addr();
    let (token, handle) = spawn(server(&config), listener, ConnectionStrategy::PerConnection);

    let mut first = tcp_client(addr);
    let mut second = tcp_client(addr);
    assert_eq!(first.call(1, "list_schemas", json!({}))["id"], 1);
    assert_eq!(second.call(2, "governance_audit", json!({}))["result"]["status"], "ok");
    assert_eq!(first.call(3, "diff_assets", json!({"base": {}, "new": {"a": 1}}))["id"], 3);

    let workers: Vec<_> = (0..4)
        .map(|n| {
            thread::spawn(move || {
                let mut client = tcp_client(addr);
                let response = client.call(100 + n, "list_schemas", json!({}));
                assert_eq!(response["id"], 100 + n);
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    drop(first);
    drop(second);
    token.cancel();
    assert!(handle.join().unwrap() >= 6);
}

#[test]
fn idle_connections_do_not_block_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let config = seed(dir.path());
    let listener = TcpSocketListener::bind("127.0.0.1", 0).unwrap();
    let addr = listener.local_addr();
    let (token, handle) = spawn(server(&config), listener, ConnectionStrategy::PerConnection);

    let mut idle = tcp_client(addr);
    assert_eq!(idle.call(1, "list_schemas", json!({}))["id"], 1);

    token.cancel();
    handle.join().unwrap();

    let mut buf = String::new();
    let read = idle.reader.read_line(&mut buf);
    assert!(matches!(read, Ok(0)) || read.is_err());
}

#[cfg(unix)]
mod unix {
    use std::os::unix::net::UnixStream;

    use schemagate_transport::UnixSocketListener;

    use super::*;

    fn unix_client(path: &Path) -> Client<UnixStream> {
        let stream = UnixStream::connect(path).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        Client::new(stream)
    }

    #[test]
    fn unix_socket_serves_clients_one_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let config = seed(dir.path());
        let path = dir.path().join("gate.sock");
        let listener = UnixSocketListener::bind(&path).unwrap();
        let (token, handle) = spawn(server(&config), listener, ConnectionStrategy::Sequential);

        let mut first = unix_client(&path);
        assert_eq!(first.call(1, "list_schemas", json!({}))["id"], 1);

        let mut second = unix_client(&path);
        second
            .reader
            .get_ref()
            .set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        second.send(r#"{"protocolVersion":"2.0","id":2,"method":"list_schemas"}"#);
        let mut line = String::new();
        let err = second.reader.read_line(&mut line).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut));

        drop(first);
        second
            .reader
            .get_ref()
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let response = second.recv();
        assert_eq!(response["id"], 2);

        drop(second);
        token.cancel();
        assert_eq!(handle.join().unwrap(), 2);
    }

    #[test]
    fn unix_oversized_frame_gets_null_id() {
        let dir = tempfile::tempdir().unwrap();
        let config = seed(dir.path());
        let path = dir.path().join("big.sock");
        let listener = UnixSocketListener::bind(&path).unwrap();
        let (token, handle) = spawn(server(&config), listener, ConnectionStrategy::Sequential);

        let mut client = unix_client(&path);
        client.send(&format!(
            r#"{{"protocolVersion":"2.0","id":3,"method":"validate_asset","params":{{"asset":"{}"}}}}"#,
            "y".repeat(1024 * 1024 + 1)
        ));
        let rejected = client.recv();
        assert_eq!(rejected["id"], Value::Null);
        assert_eq!(rejected["result"]["errors"][0]["msg"], "payload_too_large");
        assert_eq!(client.call(4, "list_schemas", json!({}))["id"], 4);

        drop(client);
        token.cancel();
        handle.join().unwrap();
    }

    #[test]
    fn client_that_never_reads_cannot_hold_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            write_timeout: Some(Duration::from_millis(200)),
            shutdown_grace: Duration::from_millis(300),
            ..seed(dir.path())
        };
        let path = dir.path().join("stuck.sock");
        let listener = UnixSocketListener::bind(&path).unwrap();
        let (token, handle) = spawn(server(&config), listener, ConnectionStrategy::Sequential);

        let stream = UnixStream::connect(&path).unwrap();
        let flooder = thread::spawn(move || {
            let mut stream = stream;
            let request = json!({
                "protocolVersion": "2.0",
                "id": 1,
                "method": "diff_assets",
                "params": {"base": {}, "new": {"blob": "z".repeat(200 * 1024)}},
            })
            .to_string();
            for _ in 0..40 {
                if stream.write_all(request.as_bytes()).is_err()
                    || stream.write_all(b"\n").is_err()
                {
                    break;
                }
            }
            stream
        });

        thread::sleep(Duration::from_millis(1500));
        token.cancel();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(handle.is_finished(), "listener kept serving a stalled client");
        assert_eq!(handle.join().unwrap(), 1);
        drop(flooder.join().unwrap());
    }

    #[test]
    fn unix_socket_file_is_removed_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let config = seed(dir.path());
        let path = dir.path().join("gone.sock");
        let listener = UnixSocketListener::bind(&path).unwrap();
        let (token, handle) = spawn(server(&config), listener, ConnectionStrategy::Sequential);

        let mut client = unix_client(&path);
        let frame = client.call(1, "nope", json!({}));
        assert_eq!(frame["result"]["reason"], "unsupported");
        drop(client);

        token.cancel();
        handle.join().unwrap();
        assert!(!path.exists());
    }
}
