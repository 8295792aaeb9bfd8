//! HTTP adapter controller
//!
//! Wraps an embedded `tiny_http` server and adapts accepted POST requests
//! into fire-and-forget commands:
//!
//! - `POST /v1/start` → `start` command, replies `200 {"message":"started"}`
//! - `POST /v1/end`   → `end` command, replies `200 {"message":"ended"}`
//! - anything else    → `404`
//!
//! A single in-flight request is allowed across all endpoints with no
//! queueing: while one request holds the permit, every other request is
//! rejected immediately with `429`. The request body is passed through
//! verbatim as the command payload.

use parking_lot::Mutex;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Method, Request, Response, Server};

use crate::controller::{CommandListener, Controller};
use crate::model::{CommandKind, ModelCommand};

type SharedListener = Arc<Mutex<Option<CommandListener>>>;

/// Controller that adapts HTTP POSTs into commands
pub struct HttpController {
    id: String,
    port: u16,
    listener: SharedListener,
    busy: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
}

impl HttpController {
    /// Create an adapter that will bind `0.0.0.0:<port>` on `start`
    pub fn new(port: u16) -> Self {
        Self {
            id: format!("webapi:{}", port),
            port,
            listener: Arc::new(Mutex::new(None)),
            busy: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            accept_thread: Mutex::new(None),
        }
    }
}

impl Controller for HttpController {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_command_listener(&self, listener: Option<CommandListener>) {
        *self.listener.lock() = listener;
    }

    fn start(&self) -> bool {
        let mut slot = self.accept_thread.lock();
        if slot.is_some() {
            return true;
        }

        let server = match Server::http(("0.0.0.0", self.port)) {
            Ok(s) => s,
            Err(e) => {
                log::error!("HttpController: failed to bind port {}: {}", self.port, e);
                return false;
            }
        };
        log::info!("HttpController: listening on 0.0.0.0:{}", self.port);

        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let listener = Arc::clone(&self.listener);
        let busy = Arc::clone(&self.busy);
        let controller_id = self.id.clone();

        let handle = thread::Builder::new()
            .name("http-accept".to_string())
            .spawn(move || {
                accept_loop(server, running, listener, busy, controller_id);
            });

        match handle {
            Ok(h) => {
                *slot = Some(h);
                true
            }
            Err(e) => {
                log::error!("HttpController: failed to spawn accept thread: {}", e);
                self.running.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    fn stop(&self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.lock().take() {
            if handle.join().is_err() {
                log::error!("HttpController: accept thread panicked");
                return false;
            }
            log::info!("HttpController: stopped");
        }
        true
    }
}

impl Drop for HttpController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Poll for requests until shutdown; each request gets its own thread so
/// the in-flight permit is enforced across overlapping connections
fn accept_loop(
    server: Server,
    running: Arc<AtomicBool>,
    listener: SharedListener,
    busy: Arc<AtomicBool>,
    controller_id: String,
) {
    while running.load(Ordering::SeqCst) {
        match server.recv_timeout(Duration::from_millis(100)) {
            Ok(Some(request)) => {
                let listener = Arc::clone(&listener);
                let busy = Arc::clone(&busy);
                let controller_id = controller_id.clone();
                let spawned = thread::Builder::new()
                    .name("http-request".to_string())
                    .spawn(move || handle_request(request, listener, busy, controller_id));
                if let Err(e) = spawned {
                    log::error!("HttpController: failed to spawn request thread: {}", e);
                }
            }
            Ok(None) => {
                // Poll timeout, check shutdown flag
            }
            Err(e) => {
                log::error!("HttpController: accept error: {}", e);
            }
        }
    }
    log::debug!("HttpController: accept loop exiting");
}

fn handle_request(
    mut request: Request,
    listener: SharedListener,
    busy: Arc<AtomicBool>,
    controller_id: String,
) {
    // One request in flight, queue size zero: losers are turned away now.
    if busy
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        log::debug!("HttpController: request rejected, another is in flight");
        let _ = request.respond(Response::empty(429));
        return;
    }

    let route = match (request.method(), request.url()) {
        (Method::Post, "/v1/start") => Some((CommandKind::Start, "started")),
        (Method::Post, "/v1/end") => Some((CommandKind::End, "ended")),
        _ => None,
    };

    let outcome = match route {
        Some((kind, verb)) => {
            let mut body = Vec::new();
            if let Err(e) = request.as_reader().read_to_end(&mut body) {
                log::warn!("HttpController: body read error: {}", e);
            }
            let body = String::from_utf8_lossy(&body).into_owned();

            let cmd = ModelCommand::new(controller_id, kind, body, None);
            match listener.lock().clone() {
                Some(emit) => (*emit)(cmd),
                None => log::warn!("HttpController: no listener installed, command dropped"),
            }

            let json = serde_json::json!({ "message": verb }).to_string();
            let mut response = Response::from_string(json);
            if let Ok(header) = "Content-Type: application/json".parse::<tiny_http::Header>() {
                response = response.with_header(header);
            }
            request.respond(response)
        }
        None => request.respond(Response::empty(404)),
    };

    busy.store(false, Ordering::SeqCst);

    if let Err(e) = outcome {
        log::warn!("HttpController: response write failed: {}", e);
    }
}
