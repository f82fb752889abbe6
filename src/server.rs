//! Connection Server
//!
//! A fixed pool of independent event-loop workers, each an OS thread running
//! a current-thread runtime and exclusively owning the connections handed to
//! it. One blocking acceptor distributes new connections round-robin, so no
//! connection state is ever shared between workers. Request handling is
//! fully synchronous inside a single read event: extract one frame, parse,
//! query, render, write back, reuse the buffers. The only await points are
//! the socket read and write themselves.
//!
//! [`handle_request`] is the complete bytes-in/bytes-out pipeline and has no
//! socket dependency; integration tests drive it directly.

use crate::cache::PointCaches;
use crate::error::{RequestError, RequestResult};
use crate::http::{parse_request, response, Request, Route};
use crate::pool::BufferPool;
use crate::query::QueryEngine;
use bytes::{Buf, BytesMut};
use socket2::{SockRef, TcpKeepalive};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default number of independent event-loop workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Per-connection accumulation buffer start size.
const INPUT_BUFFER_CAPACITY: usize = 16 * 1024;

/// Per-connection output scratch start size.
const OUTPUT_BUFFER_CAPACITY: usize = 4096;

/// Everything the request pipeline reads: the engine over the immutable
/// store, the scratch-buffer pool, and the optional point-lookup caches.
/// Shared read-only across all workers.
#[derive(Debug)]
pub struct ServiceState {
    pub engine: QueryEngine,
    pub buffers: BufferPool,
    pub caches: Option<PointCaches>,
}

/// Run one buffered request through parse → dispatch → render. `out` ends up
/// holding exactly the bytes to write back; failures render the static
/// 400/404 responses and never propagate.
pub fn handle_request(state: &ServiceState, raw: &[u8], out: &mut Vec<u8>) {
    let request = match parse_request(raw) {
        Ok(request) => request,
        Err(error) => {
            out.extend_from_slice(response::static_error(error));
            return;
        }
    };

    if let Err(error) = dispatch(state, &request, out) {
        out.clear();
        out.extend_from_slice(response::static_error(error));
    }
}

fn dispatch(state: &ServiceState, request: &Request<'_>, out: &mut Vec<u8>) -> RequestResult<()> {
    match request.route {
        Route::GetUser => {
            if let Some(caches) = &state.caches {
                if let Some(hit) = caches.users.get(request.path) {
                    out.extend_from_slice(&hit);
                    return Ok(());
                }
            }
            let user = state.engine.user(request.entity_id)?;
            let mut body = state.buffers.acquire();
            response::append_user(&mut body, user);
            response::write_json_ok(out, &body);
            if let Some(caches) = &state.caches {
                caches.users.insert_if_absent(request.path, out);
            }
            Ok(())
        }
        Route::GetLocation => {
            if let Some(caches) = &state.caches {
                if let Some(hit) = caches.locations.get(request.path) {
                    out.extend_from_slice(&hit);
                    return Ok(());
                }
            }
            let location = state.engine.location(request.entity_id)?;
            let mut body = state.buffers.acquire();
            response::append_location(&mut body, location);
            response::write_json_ok(out, &body);
            if let Some(caches) = &state.caches {
                caches.locations.insert_if_absent(request.path, out);
            }
            Ok(())
        }
        Route::GetVisit => {
            let visit = state.engine.visit(request.entity_id)?;
            let mut body = state.buffers.acquire();
            response::append_visit(&mut body, visit);
            response::write_json_ok(out, &body);
            Ok(())
        }
        Route::GetUserVisits => {
            let scan = state
                .engine
                .visited_places(request.entity_id, &request.query)?;
            if scan.index_is_empty() {
                out.extend_from_slice(response::EMPTY_VISITS);
            } else {
                let mut body = state.buffers.acquire();
                scan.render(&mut body);
                response::write_json_ok(out, &body);
            }
            Ok(())
        }
        Route::GetLocationAvg => {
            match state.engine.avg_mark(request.entity_id, &request.query)? {
                None => out.extend_from_slice(response::EMPTY_AVG),
                Some(avg) => {
                    let mut body = state.buffers.acquire();
                    body.extend_from_slice(b"{\"avg\": ");
                    response::append_avg(&mut body, avg);
                    body.push(b'}');
                    response::write_json_ok(out, &body);
                }
            }
            Ok(())
        }
        Route::CreateUser
        | Route::CreateLocation
        | Route::CreateVisit
        | Route::UpdateUser
        | Route::UpdateLocation
        | Route::UpdateVisit => {
            // Structural routes: recognized, but the service has no write
            // path; answered exactly like an unknown entity.
            Err(RequestError::NotFound)
        }
    }
}

/// The event-driven acceptor/dispatcher binding the pipeline to sockets.
#[derive(Debug)]
pub struct Server {
    state: Arc<ServiceState>,
    workers: usize,
    keepalive: Duration,
}

impl Server {
    pub fn new(state: ServiceState, workers: usize, keepalive: Duration) -> Self {
        Self {
            state: Arc::new(state),
            workers: workers.max(1),
            keepalive,
        }
    }

    /// Bind the listen port and serve until the process dies. The caller
    /// supplies the port; the library bakes in no default.
    pub fn run(&self, port: u16) -> anyhow::Result<()> {
        let listener = std::net::TcpListener::bind(("0.0.0.0", port))?;

        let mut to_workers = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let (tx, rx) = mpsc::unbounded_channel();
            let state = Arc::clone(&self.state);
            let keepalive = self.keepalive;
            std::thread::Builder::new()
                .name(format!("travels-worker-{worker}"))
                .spawn(move || worker_loop(worker, rx, state, keepalive))?;
            to_workers.push(tx);
        }

        info!(port, workers = self.workers, "server is listening");

        // Round-robin hand-off; each connection is owned by one worker for
        // its whole lifetime.
        let mut next = 0usize;
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if to_workers[next].send((stream, peer)).is_err() {
                        anyhow::bail!("worker {next} exited, refusing to serve degraded");
                    }
                    next = (next + 1) % to_workers.len();
                }
                Err(error) => warn!(%error, "accept failed"),
            }
        }
    }
}

type Incoming = (std::net::TcpStream, SocketAddr);

fn worker_loop(
    worker: usize,
    mut incoming: mpsc::UnboundedReceiver<Incoming>,
    state: Arc<ServiceState>,
    keepalive: Duration,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            warn!(worker, %error, "worker runtime failed to start");
            return;
        }
    };

    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, async move {
        while let Some((stream, peer)) = incoming.recv().await {
            match register_connection(stream, keepalive) {
                Ok(stream) => {
                    let state = Arc::clone(&state);
                    tokio::task::spawn_local(async move {
                        debug!(worker, %peer, "connection opened");
                        if let Err(error) = serve_connection(&state, stream).await {
                            debug!(worker, %peer, %error, "connection closed");
                        }
                    });
                }
                Err(error) => debug!(worker, %peer, %error, "connection setup failed"),
            }
        }
    });
}

/// Apply the fixed socket options and move the stream onto this worker's
/// runtime.
fn register_connection(
    stream: std::net::TcpStream,
    keepalive: Duration,
) -> std::io::Result<tokio::net::TcpStream> {
    SockRef::from(&stream).set_tcp_keepalive(&TcpKeepalive::new().with_time(keepalive))?;
    stream.set_nodelay(true)?;
    stream.set_nonblocking(true)?;
    tokio::net::TcpStream::from_std(stream)
}

async fn serve_connection(
    state: &ServiceState,
    mut stream: tokio::net::TcpStream,
) -> std::io::Result<()> {
    let mut input = BytesMut::with_capacity(INPUT_BUFFER_CAPACITY);
    let mut output = Vec::with_capacity(OUTPUT_BUFFER_CAPACITY);

    loop {
        if stream.read_buf(&mut input).await? == 0 {
            return Ok(());
        }

        while let Some(frame) = frame_length(&input) {
            output.clear();
            handle_request(state, &input[..frame], &mut output);
            stream.write_all(&output).await?;
            input.advance(frame);
        }
    }
}

/// Length of the first complete request in the buffer, if any. Framing
/// assumes GET requests end at the header-terminating blank line; a POST
/// frame takes the whole buffered sequence, since its body follows the
/// headers and no POST route reads beyond the first brace.
fn frame_length(input: &BytesMut) -> Option<usize> {
    let headers_end = input.windows(4).position(|window| window == b"\r\n\r\n")? + 4;
    if input.starts_with(b"POST") {
        Some(input.len())
    } else {
        Some(headers_end)
    }
}
