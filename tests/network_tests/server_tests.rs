//! Tests for the TCP server, connection handler and client
//!
//! These tests verify:
//! - One response line per request line
//! - Error strings are sent back as responses
//! - Connection limit, message size limit and idle timeout
//! - Cancellation stops the accept loop

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use kvwal::network::{TcpClient, OK_RESPONSE, TOO_MANY_CONNECTIONS};
use kvwal::{CancelToken, KvError, Query};

use super::TestServer;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

fn read_line(stream: &TcpStream) -> String {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    line.trim_end().to_string()
}

// =============================================================================
// Request/Response Tests
// =============================================================================

#[test]
fn test_set_get_del_over_tcp() {
    let server = TestServer::with_defaults();
    let client = TcpClient::connect(&server.address, CLIENT_TIMEOUT).unwrap();

    assert_eq!(client.send("SET user_1 alice").unwrap(), OK_RESPONSE);
    assert_eq!(client.send("GET user_1").unwrap(), "alice");
    assert_eq!(client.send("DEL user_1").unwrap(), OK_RESPONSE);
    assert_eq!(client.send("GET user_1").unwrap(), "key not found");

    assert!(server.engine.get("user_1").is_err());
}

#[test]
fn test_errors_are_sent_as_responses() {
    let server = TestServer::with_defaults();
    let client = TcpClient::connect(&server.address, CLIENT_TIMEOUT).unwrap();

    assert_eq!(
        client.send("SET a").unwrap(),
        "invalid command: args count must be 2"
    );
    assert_eq!(
        client.send("PUT a 1").unwrap(),
        "invalid command: invalid command type PUT"
    );
    assert_eq!(
        client.send("SET a-b 1").unwrap(),
        "invalid command: invalid char -[1]"
    );

    // Connection stays usable after errors
    assert_eq!(client.send("SET a 1").unwrap(), OK_RESPONSE);
}

#[test]
fn test_crlf_requests_are_accepted() {
    let server = TestServer::with_defaults();
    let mut stream = TcpStream::connect(&server.address).unwrap();
    stream.set_read_timeout(Some(CLIENT_TIMEOUT)).unwrap();

    stream.write_all(b"SET a 1\r\n").unwrap();
    assert_eq!(read_line(&stream), OK_RESPONSE);
}

#[test]
fn test_client_implements_query() {
    let server = TestServer::with_defaults();
    let client = TcpClient::connect(&server.address, CLIENT_TIMEOUT).unwrap();
    let cancel = CancelToken::new();

    assert_eq!(client.query(&cancel, "SET k v").unwrap(), OK_RESPONSE);
    assert_eq!(client.query(&cancel, "GET k").unwrap(), "v");

    cancel.cancel();
    assert!(matches!(
        client.query(&cancel, "GET k"),
        Err(KvError::Cancelled)
    ));
}

#[test]
fn test_concurrent_clients() {
    let server = TestServer::with_defaults();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let address = server.address.clone();
            thread::spawn(move || {
                let client = TcpClient::connect(&address, CLIENT_TIMEOUT).unwrap();
                for i in 0..25 {
                    let key = format!("c{}_{}", t, i);
                    assert_eq!(client.send(&format!("SET {} {}", key, i)).unwrap(), OK_RESPONSE);
                    assert_eq!(client.send(&format!("GET {}", key)).unwrap(), i.to_string());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(server.engine.memtable().len(), 100);
}

// =============================================================================
// Limit Tests
// =============================================================================

#[test]
fn test_connection_limit_rejects_extra_clients() {
    let server = TestServer::start(1, 4096, Duration::from_secs(30));

    let first = TcpClient::connect(&server.address, CLIENT_TIMEOUT).unwrap();
    // A round trip proves the first connection holds the only slot
    assert_eq!(first.send("GET a").unwrap(), "key not found");

    let mut second = TcpStream::connect(&server.address).unwrap();
    second.set_read_timeout(Some(CLIENT_TIMEOUT)).unwrap();
    assert_eq!(read_line(&second), TOO_MANY_CONNECTIONS);

    // Rejected connection is closed by the server
    let mut rest = Vec::new();
    assert_eq!(second.read_to_end(&mut rest).unwrap(), 0);

    // The first client is unaffected
    assert_eq!(first.send("SET a 1").unwrap(), OK_RESPONSE);
}

#[test]
fn test_slot_is_released_on_disconnect() {
    let server = TestServer::start(1, 4096, Duration::from_secs(30));

    {
        let first = TcpClient::connect(&server.address, CLIENT_TIMEOUT).unwrap();
        assert_eq!(first.send("SET a 1").unwrap(), OK_RESPONSE);
    }

    // The handler thread needs a moment to notice the close
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let client = TcpClient::connect(&server.address, CLIENT_TIMEOUT).unwrap();
        match client.send("GET a") {
            Ok(response) if response == "1" => break,
            _ if Instant::now() < deadline => thread::sleep(Duration::from_millis(20)),
            other => panic!("slot never released: {:?}", other),
        }
    }
}

#[test]
fn test_oversized_message_closes_connection() {
    let server = TestServer::start(10, 16, Duration::from_secs(30));
    let mut stream = TcpStream::connect(&server.address).unwrap();
    stream.set_read_timeout(Some(CLIENT_TIMEOUT)).unwrap();

    // One byte over the limit and no delimiter, so nothing is left unread
    stream.write_all(b"SET key xxxxxxxxx").unwrap();

    assert_eq!(read_line(&stream), "message too large (max 16 bytes)");
    assert!(server.engine.get("key").is_err());
}

#[test]
fn test_message_at_limit_is_accepted() {
    let server = TestServer::start(10, 16, Duration::from_secs(30));
    let client = TcpClient::connect(&server.address, CLIENT_TIMEOUT).unwrap();

    // Exactly 16 bytes before the delimiter
    let query = "SET abcd 1234567";
    assert_eq!(query.len(), 16);
    assert_eq!(client.send(query).unwrap(), OK_RESPONSE);
}

#[test]
fn test_idle_connection_is_closed() {
    let server = TestServer::start(10, 4096, Duration::from_millis(100));
    let mut stream = TcpStream::connect(&server.address).unwrap();
    stream.set_read_timeout(Some(CLIENT_TIMEOUT)).unwrap();

    let start = Instant::now();
    let mut buf = Vec::new();
    assert_eq!(stream.read_to_end(&mut buf).unwrap(), 0);
    assert!(start.elapsed() < CLIENT_TIMEOUT);
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_run_returns_after_cancel() {
    let mut server = TestServer::with_defaults();
    let client = TcpClient::connect(&server.address, CLIENT_TIMEOUT).unwrap();
    assert_eq!(client.send("SET a 1").unwrap(), OK_RESPONSE);

    server.stop().unwrap();

    // The listener is dropped with the server
    assert!(TcpStream::connect(&server.address).is_err());
}
