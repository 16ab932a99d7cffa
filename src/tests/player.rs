use crate::config::PlayerConfig;
use crate::player::{PlayerBackend, PlayerController, PlayerHandle, PreviewError};
use crate::resolver::{extract_video_id, VideoId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn vid(id: &str) -> VideoId {
    extract_video_id(&format!("https://youtu.be/{id}")).expect("test id must be 11 chars")
}

fn test_config(max_attempts: u8) -> PlayerConfig {
    PlayerConfig {
        bin: "mpv".to_string(),
        max_attempts,
        poll_interval_ms: 10,
    }
}

/// Widget runtime double. `live` counts handles that have not been released,
/// whether through `destroy` or plain drop.
struct MockBackend {
    ready: AtomicBool,
    cue_ok: bool,
    create_ok: bool,
    create_calls: AtomicUsize,
    created: AtomicUsize,
    live: Arc<AtomicUsize>,
}

impl MockBackend {
    fn new(ready: bool, cue_ok: bool, create_ok: bool) -> Arc<Self> {
        Arc::new(Self {
            ready: AtomicBool::new(ready),
            cue_ok,
            create_ok,
            create_calls: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PlayerBackend for MockBackend {
    fn probe(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn create(&self, _id: &VideoId) -> anyhow::Result<Box<dyn PlayerHandle>> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if !self.create_ok {
            anyhow::bail!("widget create refused");
        }

        self.created.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockHandle {
            live: self.live.clone(),
            cue_ok: self.cue_ok,
            released: false,
        }))
    }
}

struct MockHandle {
    live: Arc<AtomicUsize>,
    cue_ok: bool,
    released: bool,
}

impl MockHandle {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl PlayerHandle for MockHandle {
    async fn cue(&mut self, _id: &VideoId) -> anyhow::Result<()> {
        if self.cue_ok {
            Ok(())
        } else {
            anyhow::bail!("in-place cue refused")
        }
    }

    async fn destroy(&mut self) {
        self.release();
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[tokio::test(start_paused = true)]
async fn test_recue_reuses_the_live_handle() {
    let backend = MockBackend::new(true, true, true);
    let mut controller = PlayerController::start(backend.clone(), &test_config(5));

    controller.cue(&vid("aaaaaaaaaaa")).await.unwrap();
    controller.cue(&vid("bbbbbbbbbbb")).await.unwrap();

    assert_eq!(backend.created.load(Ordering::SeqCst), 1);
    assert_eq!(backend.live_handles(), 1);
    assert!(controller.is_live());
}

#[tokio::test(start_paused = true)]
async fn test_cue_failure_destroys_then_recreates() {
    let backend = MockBackend::new(true, false, true);
    let mut controller = PlayerController::start(backend.clone(), &test_config(5));

    controller.cue(&vid("aaaaaaaaaaa")).await.unwrap();
    controller.cue(&vid("bbbbbbbbbbb")).await.unwrap();

    // second cue could not reuse the widget; a fresh one replaced it
    assert_eq!(backend.created.load(Ordering::SeqCst), 2);
    assert_eq!(backend.live_handles(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_readiness_set_after_waiting_started() {
    let backend = MockBackend::new(false, true, true);
    let mut controller = PlayerController::start(backend.clone(), &test_config(5));

    tokio::spawn({
        let backend = backend.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            backend.ready.store(true, Ordering::SeqCst);
        }
    });

    controller.cue(&vid("aaaaaaaaaaa")).await.unwrap();

    assert_eq!(backend.live_handles(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_never_ready_goes_terminal() {
    let backend = MockBackend::new(false, true, true);
    let mut controller = PlayerController::start(backend.clone(), &test_config(3));

    assert_eq!(
        controller.cue(&vid("aaaaaaaaaaa")).await,
        Err(PreviewError::Unavailable)
    );
    assert!(controller.is_unavailable());
    assert_eq!(backend.create_calls.load(Ordering::SeqCst), 0);

    // terminal: even once the runtime shows up, no further attempts are made
    backend.ready.store(true, Ordering::SeqCst);
    assert_eq!(
        controller.cue(&vid("bbbbbbbbbbb")).await,
        Err(PreviewError::Unavailable)
    );
    assert_eq!(backend.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_create_failures_are_bounded() {
    let backend = MockBackend::new(true, true, false);
    let mut controller = PlayerController::start(backend.clone(), &test_config(3));

    assert_eq!(
        controller.cue(&vid("aaaaaaaaaaa")).await,
        Err(PreviewError::Unavailable)
    );

    assert_eq!(backend.create_calls.load(Ordering::SeqCst), 3);
    assert_eq!(backend.live_handles(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_the_handle() {
    let backend = MockBackend::new(true, true, true);
    let mut controller = PlayerController::start(backend.clone(), &test_config(5));

    controller.cue(&vid("aaaaaaaaaaa")).await.unwrap();
    assert_eq!(backend.live_handles(), 1);

    controller.shutdown().await;

    assert_eq!(backend.live_handles(), 0);
    assert!(!controller.is_live());
}

#[tokio::test(start_paused = true)]
async fn test_drop_releases_the_handle() {
    let backend = MockBackend::new(true, true, true);

    {
        let mut controller = PlayerController::start(backend.clone(), &test_config(5));
        controller.cue(&vid("aaaaaaaaaaa")).await.unwrap();
        assert_eq!(backend.live_handles(), 1);
    }

    assert_eq!(backend.live_handles(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_mount_unmount_cycles_do_not_leak() {
    let backend = MockBackend::new(true, true, true);

    for _ in 0..3 {
        let mut controller = PlayerController::start(backend.clone(), &test_config(5));
        controller.cue(&vid("aaaaaaaaaaa")).await.unwrap();
        controller.shutdown().await;
        assert_eq!(backend.live_handles(), 0);
    }

    assert_eq!(backend.created.load(Ordering::SeqCst), 3);
    assert_eq!(backend.live_handles(), 0);
}
