use crate::{
    config::PlayerConfig,
    resolver::{watch_url, VideoId},
};
use async_trait::async_trait;
use rand::random;
use std::{
    process::Stdio,
    sync::atomic::{AtomicU64, Ordering},
    sync::Arc,
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle, time::sleep};

/// Cap on backoff growth between creation attempts.
const MAX_BACKOFF_EXP: u32 = 6;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PreviewError {
    /// Creation attempts are exhausted. Terminal: the controller will not
    /// try again until it is rebuilt.
    #[error("preview unavailable")]
    Unavailable,
}

/// The third-party widget runtime. `probe` answers whether the runtime is
/// usable at all; `create` builds one live widget cued to a video id.
#[async_trait]
pub trait PlayerBackend: Send + Sync {
    fn probe(&self) -> bool;

    async fn create(&self, id: &VideoId) -> anyhow::Result<Box<dyn PlayerHandle>>;
}

/// One live widget instance. Dropping a handle must release the underlying
/// widget even when `destroy` was never awaited.
#[async_trait]
pub trait PlayerHandle: Send {
    /// In-place re-cue to a new id. Implementations may refuse; the
    /// controller then falls back to destroy + create.
    async fn cue(&mut self, id: &VideoId) -> anyhow::Result<()>;

    /// Release the instance.
    async fn destroy(&mut self);
}

/// Owns at most one live preview widget and keeps it synchronized to the
/// latest resolved video id.
///
/// Readiness of the external runtime is a set-once watch flag written by a
/// probe task; waiters may subscribe before or after it is set. Creation is
/// attempted a bounded number of times with backoff, then the controller
/// goes terminal instead of retrying forever. All waiting happens inside
/// the `cue` future, so cancelling a cue drops its pending timer with it.
pub struct PlayerController {
    backend: Arc<dyn PlayerBackend>,
    ready: watch::Receiver<bool>,
    probe_task: JoinHandle<()>,
    handle: Option<Box<dyn PlayerHandle>>,
    unavailable: bool,
    max_attempts: u32,
    poll_interval: Duration,
}

impl PlayerController {
    pub fn start(backend: Arc<dyn PlayerBackend>, config: &PlayerConfig) -> Self {
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let (ready_tx, ready_rx) = watch::channel(false);

        // the runtime may appear after we start; keep probing until it does
        let probe_task = tokio::spawn({
            let backend = backend.clone();
            async move {
                loop {
                    if backend.probe() {
                        let _ = ready_tx.send(true);
                        return;
                    }
                    sleep(poll_interval).await;
                }
            }
        });

        Self {
            backend,
            ready: ready_rx,
            probe_task,
            handle: None,
            unavailable: false,
            max_attempts: u32::from(config.max_attempts),
            poll_interval,
        }
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }

    /// Synchronize the preview to `id`.
    ///
    /// A live widget is re-cued in place; when that fails it is destroyed
    /// and a fresh one is created, so at most one instance exists at any
    /// point.
    pub async fn cue(&mut self, id: &VideoId) -> Result<(), PreviewError> {
        if self.unavailable {
            return Err(PreviewError::Unavailable);
        }

        if let Some(mut handle) = self.handle.take() {
            match handle.cue(id).await {
                Ok(()) => {
                    self.handle = Some(handle);
                    return Ok(());
                }
                Err(err) => {
                    log::warn!("re-cue failed, falling back to a fresh player: {err:?}");
                    handle.destroy().await;
                }
            }
        }

        match self.create_with_retries(id).await {
            Some(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            None => {
                self.unavailable = true;
                Err(PreviewError::Unavailable)
            }
        }
    }

    /// Tear down the live widget and stop the probe.
    pub async fn shutdown(&mut self) {
        self.probe_task.abort();

        if let Some(mut handle) = self.handle.take() {
            handle.destroy().await;
        }
    }

    async fn create_with_retries(&mut self, id: &VideoId) -> Option<Box<dyn PlayerHandle>> {
        let ready_budget = self.poll_interval * self.max_attempts;

        match tokio::time::timeout(ready_budget, wait_ready(&mut self.ready)).await {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                log::warn!("player api not ready within {ready_budget:?}, giving up");
                return None;
            }
        }

        for attempt in 1..=self.max_attempts {
            match self.backend.create(id).await {
                Ok(handle) => return Some(handle),
                Err(err) => {
                    log::warn!(
                        "player create failed (attempt {attempt}/{}): {err:?}",
                        self.max_attempts
                    );
                }
            }

            if attempt < self.max_attempts {
                sleep(backoff_delay(self.poll_interval, attempt)).await;
            }
        }

        None
    }
}

impl Drop for PlayerController {
    fn drop(&mut self) {
        // shutdown may not have been awaited; the probe must not outlive the
        // controller and any leftover handle releases its widget on drop
        self.probe_task.abort();
        self.handle.take();
    }
}

/// Wait until the readiness flag is observed true. Returns false when the
/// writer is gone without ever setting it.
async fn wait_ready(ready: &mut watch::Receiver<bool>) -> bool {
    loop {
        if *ready.borrow_and_update() {
            return true;
        }

        if ready.changed().await.is_err() {
            return false;
        }
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let delay_ms = base_ms * 2u64.pow(attempt.min(MAX_BACKOFF_EXP) - 1) + random::<u64>() % base_ms;

    Duration::from_millis(delay_ms)
}

static HANDLE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Preview widget backed by an external `mpv` process.
pub struct MpvBackend {
    bin: String,
}

impl MpvBackend {
    pub fn new(bin: &str) -> Self {
        Self {
            bin: bin.to_string(),
        }
    }
}

#[async_trait]
impl PlayerBackend for MpvBackend {
    fn probe(&self) -> bool {
        which::which(&self.bin).is_ok()
    }

    async fn create(&self, id: &VideoId) -> anyhow::Result<Box<dyn PlayerHandle>> {
        let socket_path = std::env::temp_dir().join(format!(
            "ytd-mpv-{}-{}.sock",
            std::process::id(),
            HANDLE_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let child = tokio::process::Command::new(&self.bin)
            .arg("--no-terminal")
            .arg("--force-window")
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .arg(watch_url(id))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        log::debug!("spawned {} for {id}", self.bin);

        Ok(Box::new(MpvHandle { child, socket_path }))
    }
}

pub struct MpvHandle {
    child: tokio::process::Child,
    socket_path: std::path::PathBuf,
}

impl MpvHandle {
    /// One json command per line over the player's IPC socket.
    #[cfg(unix)]
    async fn send_command(&self, payload: &serde_json::Value) -> anyhow::Result<()> {
        use tokio::io::AsyncWriteExt;

        let mut stream = tokio::net::UnixStream::connect(&self.socket_path).await?;
        let mut line = payload.to_string();
        line.push('\n');
        stream.write_all(line.as_bytes()).await?;

        Ok(())
    }

    #[cfg(not(unix))]
    async fn send_command(&self, _payload: &serde_json::Value) -> anyhow::Result<()> {
        anyhow::bail!("ipc re-cue is unix-only")
    }
}

#[async_trait]
impl PlayerHandle for MpvHandle {
    async fn cue(&mut self, id: &VideoId) -> anyhow::Result<()> {
        // a dead process cannot be re-cued
        if let Some(status) = self.child.try_wait()? {
            anyhow::bail!("player exited: {status}");
        }

        self.send_command(&serde_json::json!({
            "command": ["loadfile", watch_url(id), "replace"]
        }))
        .await
    }

    async fn destroy(&mut self) {
        if let Err(err) = self.child.start_kill() {
            log::debug!("player already gone: {err:?}");
        }

        let _ = self.child.wait().await;
        let _ = std::fs::remove_file(&self.socket_path);
    }
}
