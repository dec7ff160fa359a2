//! BroadcastServer - Pushes the latest sample to every connected client
//!
//! ## Task Layout
//!
//! ```text
//!                  ┌──────────────┐
//!   sampler ──────▶│  SampleSlot  │ (ArcSwap, whole-snapshot swap)
//!                  └──────┬───────┘
//!                         │ latest()
//!          ┌──────────────┼──────────────┐
//!          ▼              ▼              ▼
//!     client loop    client loop    client loop     one task per connection, 1 line / tick
//!          ▲              ▲              ▲
//!          └──── accept loop registers ──┘          ClientRegistry behind one Mutex
//! ```
//!
//! Every loop watches the same running flag. A client is removed from the registry exactly once:
//! either by its own loop after a failed write, or by [`BroadcastServer::shutdown`].

use std::{
    collections::HashMap,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::{
    io::AsyncWriteExt,
    net::{UnixListener, UnixSocket, UnixStream},
    sync::{Mutex, oneshot, watch},
    task::JoinHandle,
    time::{MissedTickBehavior, interval, timeout},
};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{codec::encode_line, sampler::SampleSlot};

pub const LISTEN_BACKLOG: u32 = 5;

pub const SEND_INTERVAL: Duration = Duration::from_secs(1);

pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a failed accept
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub socket_path: PathBuf,

    /// Time between two records sent to the same client
    pub send_interval: Duration,

    /// A single write blocking longer than this drops the client
    pub write_timeout: Duration,
}

impl ServerOptions {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            send_interval: SEND_INTERVAL,
            write_timeout: WRITE_TIMEOUT,
        }
    }
}

/// One live consumer as seen by the registry.
#[derive(Debug)]
pub struct ClientConnection {
    pub id: u64,
    pub connected_at: DateTime<Utc>,
    close: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct ClientRegistry {
    next_id: u64,
    clients: HashMap<u64, ClientConnection>,
}

impl ClientRegistry {
    fn register(
        &mut self,
        spawn: impl FnOnce(u64, oneshot::Receiver<()>) -> JoinHandle<()>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let (close, close_rx) = oneshot::channel();
        let task = spawn(id, close_rx);

        self.clients.insert(
            id,
            ClientConnection {
                id,
                connected_at: Utc::now(),
                close,
                task,
            },
        );
        id
    }

    fn remove(&mut self, id: u64) -> Option<ClientConnection> {
        self.clients.remove(&id)
    }

    fn drain(&mut self) -> Vec<ClientConnection> {
        self.clients.drain().map(|(_, client)| client).collect()
    }
}

#[derive(Debug)]
struct Shared {
    slot: SampleSlot,
    clients: Mutex<ClientRegistry>,
    live: AtomicUsize,
    send_interval: Duration,
    write_timeout: Duration,
}

impl Shared {
    async fn remove_client(&self, id: u64) -> Option<ClientConnection> {
        let removed = self.clients.lock().await.remove(id);
        if removed.is_some() {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
        removed
    }
}

pub struct BroadcastServer {
    socket_path: PathBuf,
    shared: Arc<Shared>,
    running: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
}

impl BroadcastServer {
    /// Create the endpoint and start accepting clients.
    ///
    /// Any stale socket file at the path is removed first. Must be called within a Tokio runtime.
    #[instrument(skip_all, fields(socket = %options.socket_path.display()))]
    pub fn bind(options: ServerOptions, slot: SampleSlot) -> anyhow::Result<Self> {
        let ServerOptions {
            socket_path,
            send_interval,
            write_timeout,
        } = options;

        remove_endpoint(&socket_path).context("failed to remove stale socket")?;

        let socket = UnixSocket::new_stream().context("failed to create socket")?;
        socket
            .bind(&socket_path)
            .with_context(|| format!("failed to bind {}", socket_path.display()))?;
        let listener = socket
            .listen(LISTEN_BACKLOG)
            .context("failed to listen on socket")?;
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o666))
            .context("failed to set socket permissions")?;

        let (running, running_rx) = watch::channel(true);
        let shared = Arc::new(Shared {
            slot,
            clients: Mutex::new(ClientRegistry::default()),
            live: AtomicUsize::new(0),
            send_interval,
            write_timeout,
        });

        let accept_task = tokio::spawn(accept_loop(listener, shared.clone(), running_rx));

        info!("🚀 socket server listening on {}", socket_path.display());

        Ok(Self {
            socket_path,
            shared,
            running,
            accept_task: Some(accept_task),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Receiver for the running flag, for loops living outside the server (the sampler).
    pub fn running(&self) -> watch::Receiver<bool> {
        self.running.subscribe()
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    pub fn client_count(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// A cheap, thread-safe view of the live client count.
    pub fn client_counter(&self) -> impl Fn() -> usize + Send + 'static {
        let shared = self.shared.clone();
        move || shared.live.load(Ordering::SeqCst)
    }

    /// Stop accepting, close every client and remove the socket file.
    ///
    /// Safe to call more than once.
    #[instrument(skip_all, fields(socket = %self.socket_path.display()))]
    pub async fn shutdown(&mut self) {
        self.running.send_replace(false);

        // the listener is dropped (closed) when the accept loop returns
        if let Some(task) = self.accept_task.take()
            && let Err(e) = task.await
        {
            error!("accept loop ended abnormally: {e}");
        }

        let clients = self.shared.clients.lock().await.drain();
        self.shared.live.store(0, Ordering::SeqCst);

        let closed = clients.len();
        for client in clients {
            let _ = client.close.send(());
            if let Err(e) = client.task.await {
                error!("client {} ended abnormally: {e}", client.id);
            }
        }

        if let Err(e) = remove_endpoint(&self.socket_path) {
            warn!("failed to remove socket {}: {e}", self.socket_path.display());
        }

        info!("⛔ socket server stopped ({closed} clients closed)");
    }
}

fn remove_endpoint(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        result => result,
    }
}

#[instrument(skip_all)]
async fn accept_loop(
    listener: UnixListener,
    shared: Arc<Shared>,
    mut running: watch::Receiver<bool>,
) {
    debug!("starting accept loop");

    while *running.borrow() {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        // counted before the client task can remove itself
                        shared.live.fetch_add(1, Ordering::SeqCst);
                        let id = shared.clients.lock().await.register(|id, close| {
                            tokio::spawn(client_loop(
                                id,
                                stream,
                                close,
                                shared.clone(),
                                running.clone(),
                            ))
                        });
                        info!("✅ client {id} connected");
                    }
                    Err(e) => accept_failed(&e, &running).await,
                }
            }

            changed = running.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!("accept loop stopped");
}

/// Log a failed accept and back off. Errors after shutdown started are expected and ignored.
async fn accept_failed(e: &std::io::Error, running: &watch::Receiver<bool>) {
    if !*running.borrow() {
        return;
    }
    error!("failed to accept client: {e}");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

#[instrument(skip(stream, close, shared, running))]
async fn client_loop(
    id: u64,
    mut stream: UnixStream,
    mut close: oneshot::Receiver<()>,
    shared: Arc<Shared>,
    mut running: watch::Receiver<bool>,
) {
    let mut ticker = interval(shared.send_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}

            _ = &mut close => {
                debug!("client {id} closed by shutdown");
                break;
            }

            _ = stopped(&mut running) => break,
        }

        let sample = shared.slot.latest();
        let line = match encode_line(&sample) {
            Ok(line) => line,
            Err(e) => {
                error!("failed to encode sample: {e}");
                continue;
            }
        };

        // shutdown and close are observed while a write is blocked
        tokio::select! {
            written = timeout(shared.write_timeout, stream.write_all(&line)) => match written {
                Ok(Ok(())) => trace!("sent sample {}", sample.timestamp),
                Ok(Err(e)) => {
                    warn!("client {id} disconnected: {e}");
                    break;
                }
                Err(_) => {
                    warn!("client {id} write timed out");
                    break;
                }
            },

            _ = &mut close => {
                debug!("client {id} closed by shutdown during a write");
                break;
            }

            _ = stopped(&mut running) => break,
        }
    }

    if let Some(client) = shared.remove_client(id).await {
        let connected_for = Utc::now() - client.connected_at;
        debug!(
            "client {id} removed from live set after {}s",
            connected_for.num_seconds()
        );
    }
    let _ = stream.shutdown().await;
}

/// Resolves once the running flag is cleared or its sender is gone.
async fn stopped(running: &mut watch::Receiver<bool>) {
    let _ = running.wait_for(|running| !*running).await;
}
