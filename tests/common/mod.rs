//! Shared helpers for integration tests.
//!
//! Tests run against scripted in-process TCP servers speaking literal
//! RESP bytes: one script per accepted connection, one step per read.
//! The server records every received chunk so tests can assert on the
//! exact wire traffic.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use redlink::{Client, Config};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One scripted server action.
pub enum Step {
    /// Read one request chunk, then write these bytes.
    Reply(&'static [u8]),
    /// Read one request chunk, then write nothing.
    Silent,
    /// Read one request chunk, wait, then write these bytes.
    DelayedReply(Duration, &'static [u8]),
    /// Close the connection immediately, without reading.
    Close,
}

pub struct MockServer {
    pub addr: String,
    accepted: Arc<AtomicUsize>,
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockServer {
    /// Start a server that plays `scripts[i]` on the i-th accepted
    /// connection, then stops accepting. Connections are served
    /// concurrently, so a long-lived one never blocks the next accept.
    pub async fn start(scripts: Vec<Vec<Step>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accepted = Arc::new(AtomicUsize::new(0));
        let frames = Arc::new(Mutex::new(Vec::new()));

        let accepted_task = Arc::clone(&accepted);
        let frames_task = Arc::clone(&frames);
        tokio::spawn(async move {
            for script in scripts {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                accepted_task.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(run_script(socket, script, Arc::clone(&frames_task)));
            }
        });

        Self {
            addr,
            accepted,
            frames,
        }
    }

    /// How many connections the server accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Every received chunk, in arrival order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap().clone()
    }

    /// A config pointing at this server, with retries disabled.
    pub fn config(&self) -> Config {
        let (host, port) = self.addr.rsplit_once(':').unwrap();
        Config {
            host: host.to_string(),
            port: port.parse().unwrap(),
            connect_timeout: Some(Duration::from_secs(1)),
            read_timeout: Some(Duration::from_secs(5)),
            write_timeout: Some(Duration::from_secs(5)),
            ..Config::default()
        }
    }

    /// As [`MockServer::config`], with `attempts` immediate reconnects.
    pub fn retrying_config(&self, attempts: usize) -> Config {
        Config {
            reconnect_attempts: vec![Duration::ZERO; attempts],
            ..self.config()
        }
    }

    pub fn client(&self) -> Client {
        Client::new(self.config())
    }

    pub fn retrying_client(&self, attempts: usize) -> Client {
        Client::new(self.retrying_config(attempts))
    }
}

async fn run_script(mut socket: TcpStream, script: Vec<Step>, frames: Arc<Mutex<Vec<Vec<u8>>>>) {
    let mut buf = vec![0u8; 16 * 1024];
    let mut hold_open = true;

    for step in script {
        match step {
            Step::Close => {
                hold_open = false;
                break;
            }
            Step::Reply(bytes) => {
                let Ok(n) = socket.read(&mut buf).await else {
                    hold_open = false;
                    break;
                };
                if n == 0 {
                    hold_open = false;
                    break;
                }
                frames.lock().unwrap().push(buf[..n].to_vec());
                if socket.write_all(bytes).await.is_err() {
                    hold_open = false;
                    break;
                }
            }
            Step::Silent => {
                let Ok(n) = socket.read(&mut buf).await else {
                    hold_open = false;
                    break;
                };
                if n == 0 {
                    hold_open = false;
                    break;
                }
                frames.lock().unwrap().push(buf[..n].to_vec());
            }
            Step::DelayedReply(delay, bytes) => {
                let Ok(n) = socket.read(&mut buf).await else {
                    hold_open = false;
                    break;
                };
                if n == 0 {
                    hold_open = false;
                    break;
                }
                frames.lock().unwrap().push(buf[..n].to_vec());
                tokio::time::sleep(delay).await;
                if socket.write_all(bytes).await.is_err() {
                    hold_open = false;
                    break;
                }
            }
        }
    }

    if hold_open {
        // Keep the connection alive (recording any further traffic)
        // until the client hangs up, so hitting the next script really
        // requires a reconnect.
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => frames.lock().unwrap().push(buf[..n].to_vec()),
            }
        }
    }
}

/// A config pointing at a port nothing listens on. Any connection
/// attempt fails, which lets tests prove an operation never touched
/// the wire.
pub fn unreachable_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 1,
        connect_timeout: Some(Duration::from_millis(200)),
        ..Config::default()
    }
}

/// Assert that `haystack` contains `needle` as a byte substring.
pub fn assert_wire_contains(haystack: &[u8], needle: &[u8]) {
    assert!(
        haystack.windows(needle.len()).any(|w| w == needle),
        "expected {:?} on the wire, got {:?}",
        String::from_utf8_lossy(needle),
        String::from_utf8_lossy(haystack)
    );
}
