//! Shared utilities for end-to-end server tests.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;

use lantern::config::Config;
use lantern::server::{Server, ServerError, ShutdownHandle};

pub const HEAD_200: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n";
pub const HEAD_404: &[u8] = b"HTTP/1.1 404 Not Found\r\nContent-Type: text/html\r\n\r\n";

/// A server running on its own thread with a throwaway document root.
///
/// The layout on disk is `<base>/public_html/...` so tests can also place
/// files next to the root, outside of it.
pub struct TestServer {
    pub addr: SocketAddr,
    pub base: PathBuf,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<Result<(), ServerError>>>,
}

impl TestServer {
    pub fn start(name: &str, files: &[(&str, &[u8])]) -> Self {
        let base = std::env::temp_dir().join(format!("lantern-e2e-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&base);
        let root = base.join("public_html");
        std::fs::create_dir_all(&root).unwrap();

        for (path, contents) in files {
            let full = base.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(full, contents).unwrap();
        }

        let cfg = Config::from_args(["lantern", "0", "--root", root.to_str().unwrap()]).unwrap();
        let server = Server::bind(&cfg).unwrap();
        let port = server.local_addr().unwrap().port();
        let shutdown = server.shutdown_handle();
        let thread = std::thread::spawn(move || server.run());

        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            base,
            shutdown,
            thread: Some(thread),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.base.join("public_html")
    }

    pub fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream
    }

    /// Sends `raw` and returns everything the server wrote before closing.
    pub fn request(&self, raw: &[u8]) -> Vec<u8> {
        let mut stream = self.connect();
        stream.write_all(raw).unwrap();
        read_all(&mut stream)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.shutdown.trigger();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        let _ = std::fs::remove_dir_all(&self.base);
    }
}

pub fn read_all(stream: &mut TcpStream) -> Vec<u8> {
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    response
}

pub fn with_head(head: &[u8], body: &[u8]) -> Vec<u8> {
    let mut expected = head.to_vec();
    expected.extend_from_slice(body);
    expected
}
