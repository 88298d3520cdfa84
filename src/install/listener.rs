//! Loopback HTTP endpoint that accepts install requests
//!
//! A `POST` whose form-encoded body carries a `url` field enqueues that URL
//! and answers `200 OK`. A missing or empty field answers `401 Bad Request`.
//! The listener never fetches anything itself.

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use thiserror::Error;
use tiny_http::{Method, Request, Response, Server};
use url::form_urlencoded;

use crate::install::queue::InstallSender;

/// Port the listener binds unless configured otherwise.
pub const DEFAULT_PORT: u16 = 31750;

/// How long `stop` waits for the accept socket to be closed.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("unable to bind install listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("unable to start install listener thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("install listener thread panicked")]
    Panicked,
}

/// Status code and body sent back for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: &'static str,
}

impl Reply {
    const OK: Reply = Reply {
        status: 200,
        body: "OK",
    };
    const BAD_REQUEST: Reply = Reply {
        status: 401,
        body: "Bad Request",
    };
    const UNSUPPORTED: Reply = Reply {
        status: 501,
        body: "Unsupported method",
    };
}

/// Decide the reply for a request and enqueue its URL if it carries one.
pub fn handle(method: &Method, body: &str, sender: &InstallSender) -> Reply {
    if *method != Method::Post {
        debug!("Rejecting {method} request");
        return Reply::UNSUPPORTED;
    }
    let url = form_urlencoded::parse(body.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty());
    let Some(url) = url else {
        debug!("Install request without a url field");
        return Reply::BAD_REQUEST;
    };
    info!("Queued install request for {url}");
    if !sender.push(url) {
        warn!("Install queue is closed, request dropped");
    }
    Reply::OK
}

fn respond(mut request: Request, sender: &InstallSender) {
    let mut body = String::new();
    if let Err(e) = request.as_reader().read_to_string(&mut body) {
        debug!("Unable to read request body: {e}");
        body.clear();
    }
    let reply = handle(request.method(), &body, sender);
    let response = Response::from_string(reply.body).with_status_code(reply.status);
    if let Err(e) = request.respond(response) {
        debug!("Unable to send install reply: {e}");
    }
}

fn serve(server: &Server, stopping: &AtomicBool, sender: &InstallSender) {
    loop {
        match server.recv() {
            Ok(request) => respond(request, sender),
            Err(_) if stopping.load(Ordering::SeqCst) => break,
            Err(e) => error!("Install listener receive error: {e}"),
        }
    }
}

/// A bound but not yet serving listener.
pub struct InstallListener {
    server: Arc<Server>,
    addr: SocketAddr,
}

impl InstallListener {
    /// Bind the loopback address on `port`. Port `0` picks a free port.
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::Bind` if the address is unavailable.
    pub fn bind(port: u16) -> Result<Self, ListenerError> {
        let requested = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let server = Server::http(requested).map_err(|source| ListenerError::Bind {
            addr: requested,
            source,
        })?;
        let addr = server.server_addr().to_ip().unwrap_or(requested);
        Ok(Self {
            server: Arc::new(server),
            addr,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the acceptor thread. The sender comes back from [`RunningListener::stop`].
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::Spawn` if the thread cannot be created.
    pub fn spawn(self, sender: InstallSender) -> Result<RunningListener, ListenerError> {
        let stopping = Arc::new(AtomicBool::new(false));
        let server = Arc::clone(&self.server);
        let flag = Arc::clone(&stopping);
        let handle = std::thread::Builder::new()
            .name("hark-install-listener".to_string())
            .spawn(move || {
                serve(&server, &flag, &sender);
                sender
            })?;
        info!("Listening for install requests on {}", self.addr);
        Ok(RunningListener {
            server: self.server,
            addr: self.addr,
            stopping,
            handle,
        })
    }
}

/// A listener serving on its own thread.
pub struct RunningListener {
    server: Arc<Server>,
    addr: SocketAddr,
    stopping: Arc<AtomicBool>,
    handle: JoinHandle<InstallSender>,
}

impl RunningListener {
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting, join the thread and hand back the queue's sender.
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::Panicked` if the acceptor thread panicked.
    pub fn stop(self) -> Result<InstallSender, ListenerError> {
        let RunningListener {
            server,
            addr,
            stopping,
            handle,
        } = self;
        stopping.store(true, Ordering::SeqCst);
        server.unblock();
        let sender = handle.join().map_err(|_| ListenerError::Panicked)?;
        // Last handle: dropping it asks tiny_http to close the accept socket.
        drop(server);
        wait_for_release(addr);
        info!("Install listener on {addr} stopped");
        Ok(sender)
    }
}

/// Block until `addr` can be bound again. tiny_http closes its socket on its
/// own thread after the server is dropped.
fn wait_for_release(addr: SocketAddr) {
    let deadline = Instant::now() + RELEASE_TIMEOUT;
    let mut backoff = Duration::from_millis(1);
    loop {
        match TcpListener::bind(addr) {
            Ok(_) => return,
            Err(e) if Instant::now() >= deadline => {
                warn!("Port of {addr} still in use after stop: {e}");
                return;
            }
            Err(_) => {
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(Duration::from_millis(50));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::queue::install_queue;

    #[test]
    fn test_post_with_url_is_queued() {
        let (tx, rx) = install_queue();
        let reply = handle(&Method::Post, "url=https%3A%2F%2Fexample.com%2Fhello.yaml", &tx);
        assert_eq!(reply, Reply::OK);
        assert_eq!(rx.try_pop().as_deref(), Some("https://example.com/hello.yaml"));
    }

    #[test]
    fn test_post_without_url_is_rejected() {
        let (tx, rx) = install_queue();
        assert_eq!(handle(&Method::Post, "name=hello", &tx), Reply::BAD_REQUEST);
        assert_eq!(handle(&Method::Post, "url=", &tx), Reply::BAD_REQUEST);
        assert_eq!(handle(&Method::Post, "", &tx), Reply::BAD_REQUEST);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_other_methods_are_unsupported() {
        let (tx, rx) = install_queue();
        assert_eq!(handle(&Method::Get, "url=x", &tx), Reply::UNSUPPORTED);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_first_url_field_wins() {
        let (tx, rx) = install_queue();
        handle(&Method::Post, "url=a&url=b", &tx);
        assert_eq!(rx.try_pop().as_deref(), Some("a"));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_serves_and_stops() {
        let (tx, rx) = install_queue();
        let listener = InstallListener::bind(0).unwrap();
        let addr = listener.local_addr();
        assert!(addr.ip().is_loopback());
        let running = listener.spawn(tx).unwrap();

        let client = reqwest::blocking::Client::new();
        let response = client
            .post(format!("http://{addr}/"))
            .form(&[("url", "https://example.com/hello.yaml")])
            .send()
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.text().unwrap(), "OK");

        let response = client
            .post(format!("http://{addr}/"))
            .form(&[("name", "hello")])
            .send()
            .unwrap();
        assert_eq!(response.status().as_u16(), 401);
        assert_eq!(response.text().unwrap(), "Bad Request");

        assert_eq!(rx.len(), 1);
        let sender = running.stop().unwrap();
        assert!(sender.push("after-stop".to_string()));
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn test_port_is_free_after_stop() {
        let (tx, _rx) = install_queue();
        let listener = InstallListener::bind(0).unwrap();
        let port = listener.local_addr().port();
        let sender = listener.spawn(tx).unwrap().stop().unwrap();

        let again = InstallListener::bind(port).unwrap();
        assert_eq!(again.local_addr().port(), port);
        again.spawn(sender).unwrap().stop().unwrap();
    }
}
