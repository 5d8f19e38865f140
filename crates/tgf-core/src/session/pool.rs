use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rand::seq::SliceRandom;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    ports::{ClientHandle, Connector},
    Result,
};

/// File extension of credential files in the sessions directory.
pub const SESSION_EXTENSION: &str = "session";

#[derive(Default)]
struct PoolState {
    clients: Vec<Arc<dyn ClientHandle>>,
    /// Index of the next handle to hand out. Always `< clients.len()` when
    /// `clients` is non-empty.
    next: usize,
}

impl PoolState {
    fn rotate(&mut self) -> Option<Arc<dyn ClientHandle>> {
        if self.clients.is_empty() {
            return None;
        }
        let client = self.clients[self.next].clone();
        self.next = (self.next + 1) % self.clients.len();
        Some(client)
    }
}

/// Round-robin pool of authenticated sessions.
///
/// The live set is fixed by [`SessionPool::initialize`] and only shrinks
/// afterwards, through [`SessionPool::evict`]. Acquisition never waits: an
/// empty pool answers `None` straight away.
#[derive(Default)]
pub struct SessionPool {
    state: Mutex<PoolState>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool over already-connected handles, keeping their order.
    pub fn with_handles(handles: Vec<Arc<dyn ClientHandle>>) -> Self {
        Self {
            state: Mutex::new(PoolState {
                clients: handles,
                next: 0,
            }),
        }
    }

    /// Load every `*.session` file under `dir` and keep the authorized ones.
    ///
    /// Files are visited in file-name order; the survivors are shuffled once.
    /// A missing directory or zero authorized sessions leaves the pool empty.
    /// A connect or auth-check failure aborts the load; sessions opened so far
    /// are disconnected and the pool is left as it was.
    /// Returns the number of live sessions.
    pub async fn initialize(&self, dir: &Path, connector: &dyn Connector) -> Result<usize> {
        let files = discover_session_files(dir).await?;
        if files.is_empty() {
            warn!(path = %dir.display(), "no_sessions_found");
        }

        let mut clients: Vec<Arc<dyn ClientHandle>> = Vec::with_capacity(files.len());
        for file in &files {
            let session = file_label(file);
            let client = match connector.connect(file).await {
                Ok(client) => client,
                Err(e) => {
                    release(clients).await;
                    return Err(e);
                }
            };
            match client.is_authorized().await {
                Ok(true) => {
                    info!(session = %session, "session_loaded");
                    clients.push(client);
                }
                Ok(false) => {
                    warn!(session = %session, "session_not_authorized");
                    client.disconnect().await;
                }
                Err(e) => {
                    client.disconnect().await;
                    release(clients).await;
                    return Err(e);
                }
            }
        }

        clients.shuffle(&mut rand::rng());
        let count = clients.len();

        let previous = {
            let mut st = self.state.lock().await;
            std::mem::replace(
                &mut *st,
                PoolState {
                    clients,
                    next: 0,
                },
            )
        };
        for old in previous.clients {
            old.disconnect().await;
        }

        if count > 0 {
            info!(count, "session_pool_ready");
        } else {
            warn!(path = %dir.display(), "session_pool_empty");
        }
        Ok(count)
    }

    /// Next handle in rotation, or `None` when no session is live.
    pub async fn acquire(&self) -> Option<Arc<dyn ClientHandle>> {
        self.state.lock().await.rotate()
    }

    /// Remove `client` from rotation and disconnect it.
    ///
    /// Returns `false` if it was already gone. The disconnect happens after
    /// the pool lock is released.
    pub async fn evict(&self, client: &Arc<dyn ClientHandle>) -> bool {
        let remaining = {
            let mut st = self.state.lock().await;
            let Some(idx) = st.clients.iter().position(|c| Arc::ptr_eq(c, client)) else {
                return false;
            };
            st.clients.remove(idx);
            st.next = 0;
            st.clients.len()
        };

        client.disconnect().await;
        warn!(session = client.name(), remaining, "session_removed");
        true
    }

    /// Disconnect every remaining session and empty the pool.
    pub async fn shutdown(&self) {
        let clients = {
            let mut st = self.state.lock().await;
            st.next = 0;
            std::mem::take(&mut st.clients)
        };
        let count = clients.len();
        for client in clients {
            client.disconnect().await;
        }
        info!(count, "session_pool_closed");
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.clients.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.clients.is_empty()
    }
}

async fn release(clients: Vec<Arc<dyn ClientHandle>>) {
    for client in clients {
        client.disconnect().await;
    }
}

async fn discover_session_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %dir.display(), "sessions_dir_not_found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_session = path.extension().and_then(|e| e.to_str()) == Some(SESSION_EXTENSION);
        if is_session && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
