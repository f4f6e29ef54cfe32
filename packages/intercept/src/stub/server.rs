// packages/intercept/src/stub/server.rs
//! Replay stub server
//!
//! Accepts one request per connection, answers from a [`ResponseTable`] and
//! closes. Fire-and-forget messages are recorded like any other.

use crate::protocol::WireCodec;
use crate::stub::script::{ReplayScript, ResponseTable};
use crate::utils::errors::{InterceptError, Result};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Requests received, in arrival order
pub type ReceivedLog = Arc<Mutex<Vec<String>>>;

pub struct ReplayStub {
    listener: TcpListener,
    responses: Arc<ResponseTable>,
    received: ReceivedLog,
    codec: Arc<WireCodec>,
}

impl ReplayStub {
    pub async fn bind(addr: &str, script: &ReplayScript) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| InterceptError::Transport {
                endpoint: addr.to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            responses: Arc::new(ResponseTable::from_script(script)),
            received: Arc::new(Mutex::new(Vec::new())),
            codec: Arc::new(WireCodec::default()),
        })
    }

    /// Frame requests with `codec` instead of the default separator
    pub fn with_codec(mut self, codec: WireCodec) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|source| InterceptError::Transport {
                endpoint: "stub".to_string(),
                source,
            })
    }

    pub fn received(&self) -> ReceivedLog {
        Arc::clone(&self.received)
    }

    /// Serve until `shutdown` resolves
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!("Replay stub listening on {}", addr);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Replay stub on {} shutting down", addr);
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let responses = Arc::clone(&self.responses);
                            let received = Arc::clone(&self.received);
                            let codec = Arc::clone(&self.codec);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, responses, received, codec).await {
                                    warn!("Connection from {} failed: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => warn!("Accept failed: {}", e),
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    responses: Arc<ResponseTable>,
    received: ReceivedLog,
    codec: Arc<WireCodec>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf).into_owned();

    let reply = responses.respond(&request);
    debug!(request = %request, reply = %reply, "Replaying");
    let kind = request_kind(&codec, &request);
    metrics::counter!("sut_intercept_stub_requests_total", "kind" => kind).increment(1);
    received.lock().push(request);

    // Posted messages close both halves, so the peer may already be gone
    let _ = stream.write_all(reply.as_bytes()).await;
    let _ = stream.shutdown().await;
    Ok(())
}

/// Metric label for a received request; unparseable requests are still answered
fn request_kind(codec: &WireCodec, request: &str) -> &'static str {
    match codec.decode_request(request) {
        Ok(decoded) => decoded.kind().tag(),
        Err(e) => {
            warn!(request = %request, error = %e, "Malformed request");
            "malformed"
        }
    }
}

/// A stub running on its own thread, stopped on drop
pub struct StubHandle {
    addr: SocketAddr,
    received: ReceivedLog,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl StubHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `host:port` suitable for the endpoint variable
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    /// Block until at least `count` requests arrived or `timeout` elapses
    pub fn wait_for_requests(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let received = self.received();
            if received.len() >= count || Instant::now() >= deadline {
                return received;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for StubHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Start a stub on an ephemeral loopback port in a background thread
pub fn spawn_background(script: ReplayScript) -> Result<StubHandle> {
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(SocketAddr, ReceivedLog)>>(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let thread = std::thread::Builder::new()
        .name("replay-stub".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = ready_tx.send(Err(InterceptError::Local(format!(
                        "Failed to start stub runtime: {}",
                        e
                    ))));
                    return;
                }
            };

            runtime.block_on(async move {
                let stub = match ReplayStub::bind("127.0.0.1:0", &script).await {
                    Ok(stub) => stub,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let ready = stub.local_addr().map(|addr| (addr, stub.received()));
                let failed = ready.is_err();
                let _ = ready_tx.send(ready);
                if failed {
                    return;
                }

                if let Err(e) = stub
                    .serve_until(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                {
                    warn!("Replay stub stopped: {}", e);
                }
            });
        })
        .map_err(|e| InterceptError::Local(format!("Failed to spawn stub thread: {}", e)))?;

    let (addr, received) = ready_rx
        .recv()
        .map_err(|_| InterceptError::Local("Stub thread exited before binding".to_string()))??;

    Ok(StubHandle {
        addr,
        received,
        shutdown: Some(shutdown_tx),
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn send(addr: SocketAddr, message: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(message.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).await.unwrap();
        reply
    }

    #[test]
    fn test_request_kind() {
        let codec = WireCodec::default();
        assert_eq!(request_kind(&codec, "IMPORT:widgets"), "IMPORT");
        assert_eq!(request_kind(&codec, "CALL:btn-17:SEP:click:SEP:():SEP:{}"), "CALL");
        assert_eq!(request_kind(&codec, "PING"), "malformed");
        assert_eq!(request_kind(&codec, "GETATTR:a:SEP:b:SEP:c"), "malformed");

        let custom = WireCodec::new("|#|").unwrap();
        assert_eq!(request_kind(&custom, "GETATTR:os|#|path"), "GETATTR");
        assert_eq!(request_kind(&custom, "GETATTR:os:SEP:path"), "malformed");
    }

    #[tokio::test]
    async fn test_serves_script() {
        let script = ReplayScript::new().on("IMPORT:widgets", "None");
        let stub = ReplayStub::bind("127.0.0.1:0", &script).await.unwrap();
        let addr = stub.local_addr().unwrap();
        let received = stub.received();

        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(stub.serve_until(async {
            let _ = rx.await;
        }));

        assert_eq!(send(addr, "IMPORT:widgets").await, "None");
        assert_eq!(send(addr, "GETATTR:widgets:SEP:missing").await, "");
        assert_eq!(send(addr, "not a request").await, "");
        assert_eq!(
            received.lock().clone(),
            vec!["IMPORT:widgets", "GETATTR:widgets:SEP:missing", "not a request"]
        );

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[test]
    fn test_background_handle() {
        use std::io::{Read, Write};

        let handle = spawn_background(ReplayScript::new().on("IMPORT:clock", "None")).unwrap();
        let mut stream = std::net::TcpStream::connect(handle.addr()).unwrap();
        stream.write_all(b"IMPORT:clock").unwrap();
        stream.shutdown(std::net::Shutdown::Write).unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();

        assert_eq!(reply, "None");
        let received = handle.wait_for_requests(1, Duration::from_secs(2));
        assert_eq!(received, vec!["IMPORT:clock"]);
    }
}
