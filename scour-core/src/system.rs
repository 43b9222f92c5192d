//! `src/system.rs`
//! ============================================================================
//! # System: Background Scan/Search Worker
//!
//! One dedicated worker task per [`System`] serves directory-listing and
//! search requests submitted from the UI thread. Data flows one way in
//! (`Request`) and two ways out (`Response`, `Progress`) over small bounded
//! channels; the UI never calls into the worker synchronously and the worker
//! never blocks on UI readiness.
//!
//! Requests carry a caller-assigned monotonic `generation` tag. The worker
//! does not track whether a generation is still wanted; the caller compares
//! each Response's generation against the last one it cares about and
//! discards stale results. Cancellation is cooperative through a single
//! [`CancellationToken`] owned by the [`SearchCoordinator`]; issuing a new
//! search implicitly cancels the previous one through the same mechanism as
//! an explicit cancel request.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use compact_str::CompactString;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{ChannelConfig, SearchConfig};
use crate::error::AppError;
use crate::fs::content::EngineSelector;
use crate::fs::entry::Entry;
use crate::fs::lister;
use crate::fs::search::{self, SearchOutcome};

// ----------------------------------------------------------------------------
// Channel protocol types
// ----------------------------------------------------------------------------

/// What a request asks the worker to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// List the immediate children of one directory.
    FetchDir,

    /// Recursively search a subtree.
    SearchDir,

    /// Cancel the in-flight search, if any. Produces no Response.
    CancelSearch,
}

/// One unit of work submitted by the caller.
#[derive(Debug, Clone)]
pub struct Request {
    pub op: Operation,

    /// Root of the operation; ignored for [`Operation::CancelSearch`].
    pub path: PathBuf,

    /// Caller-owned monotonic tag, never reused for two logically distinct
    /// operations in one session.
    pub generation: u64,

    /// Opaque search pattern; empty for FetchDir.
    pub query: String,

    /// Content engine selection; [`EngineSelector::Names`] for pure
    /// filename searches.
    pub engine: EngineSelector,

    /// Override binary path for the content engine.
    pub external_cmd: Option<String>,

    /// Depth budget below the root; 0 or negative means the root directory
    /// only. Callers pass their configured default when the query carries
    /// no explicit depth.
    pub depth: i32,
}

impl Request {
    #[must_use]
    pub fn fetch_dir(generation: u64, path: PathBuf) -> Self {
        Self {
            op: Operation::FetchDir,
            path,
            generation,
            query: String::new(),
            engine: EngineSelector::Names,
            external_cmd: None,
            depth: 0,
        }
    }

    #[must_use]
    pub fn search_dir(generation: u64, path: PathBuf, query: String, depth: i32) -> Self {
        Self {
            op: Operation::SearchDir,
            path,
            generation,
            query,
            engine: EngineSelector::Names,
            external_cmd: None,
            depth,
        }
    }

    #[must_use]
    pub fn cancel_search() -> Self {
        Self {
            op: Operation::CancelSearch,
            path: PathBuf::new(),
            generation: 0,
            query: String::new(),
            engine: EngineSelector::Names,
            external_cmd: None,
            depth: 0,
        }
    }

    #[must_use]
    pub fn with_engine(mut self, engine: EngineSelector) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn with_external_cmd(mut self, cmd: Option<String>) -> Self {
        self.external_cmd = cmd;
        self
    }
}

/// Terminal result of one Request. Exactly one Response is produced per
/// non-Cancel request that reaches the worker.
#[derive(Debug, Clone)]
pub struct Response {
    pub op: Operation,

    pub path: PathBuf,

    pub generation: u64,

    /// Empty for pure errors and cancelled operations.
    pub entries: Vec<Entry>,

    pub error: Option<AppError>,

    /// The operation was aborted before completion. Not an error: the
    /// caller should ignore the result, not report a failure.
    pub cancelled: bool,
}

impl Response {
    fn success(req: &Request, entries: Vec<Entry>) -> Self {
        Self {
            op: req.op,
            path: req.path.clone(),
            generation: req.generation,
            entries,
            error: None,
            cancelled: false,
        }
    }

    fn failure(req: &Request, error: AppError) -> Self {
        Self {
            op: req.op,
            path: req.path.clone(),
            generation: req.generation,
            entries: Vec::new(),
            error: Some(error),
            cancelled: false,
        }
    }

    fn aborted(req: &Request) -> Self {
        Self {
            op: req.op,
            path: req.path.clone(),
            generation: req.generation,
            entries: Vec::new(),
            error: None,
            cancelled: true,
        }
    }
}

/// Transient status update during a long-running search. Within one
/// generation `current` is monotonically non-decreasing; across generations
/// there is no ordering guarantee.
#[derive(Debug, Clone)]
pub struct Progress {
    pub generation: u64,

    pub current: u64,

    /// 0 means indeterminate.
    pub total: u64,

    pub label: CompactString,
}

/// Either output channel, for consumers draining both.
#[derive(Debug, Clone)]
pub enum Event {
    Response(Response),
    Progress(Progress),
}

// ----------------------------------------------------------------------------
// Generation & cancellation coordinator
// ----------------------------------------------------------------------------

struct ActiveSearch {
    /// Internal ownership counter so a finished walk only clears its own
    /// handle, not a successor's. This is not the caller's generation tag.
    seq: u64,

    token: Option<CancellationToken>,
}

/// Holds the single live cancellation handle. At most one search is live at
/// a time: beginning a new one cancels and replaces the previous handle,
/// which is the same mechanism an explicit cancel request uses.
pub struct SearchCoordinator {
    active: Mutex<ActiveSearch>,
}

impl SearchCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Mutex::new(ActiveSearch {
                seq: 0,
                token: None,
            }),
        }
    }

    /// Start a new search session: cancel any previous handle and install a
    /// fresh one.
    pub fn begin(&self) -> (u64, CancellationToken) {
        let mut slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(prev) = slot.token.take() {
            debug!("Replacing in-flight search, cancelling previous handle");
            prev.cancel();
        }

        slot.seq += 1;
        let token: CancellationToken = CancellationToken::new();
        slot.token = Some(token.clone());

        (slot.seq, token)
    }

    /// Fire the stored handle without waiting for the walk to observe it.
    pub fn cancel(&self) {
        let mut slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(token) = slot.token.take() {
            token.cancel();
        }
    }

    /// Clear the handle when the owning walk completes. A stale `seq` means
    /// a newer search already replaced the handle; leave it alone.
    pub fn finish(&self, seq: u64) {
        let mut slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if slot.seq == seq {
            slot.token = None;
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .is_some()
    }
}

impl Default for SearchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// System: public handle around the worker task
// ----------------------------------------------------------------------------

/// Handle to one background scan/search worker.
///
/// `submit` is non-blocking; `try_recv_*` are the per-frame drains a render
/// loop uses; [`System::next_event`] is the awaiting variant for consumers
/// without a frame clock.
pub struct System {
    request_tx: Sender<Request>,

    response_rx: Receiver<Response>,

    progress_rx: Receiver<Progress>,

    progress_closed: bool,

    worker: JoinHandle<()>,
}

impl System {
    /// Spawn the worker task and wire up its channels.
    #[must_use]
    pub fn spawn(search: SearchConfig, channels: &ChannelConfig) -> Self {
        // tokio panics on zero-capacity channels; a hand-edited config file
        // must not take the worker down.
        let (request_tx, request_rx) = mpsc::channel(channels.request_capacity.max(1));
        let (response_tx, response_rx) = mpsc::channel(channels.response_capacity.max(1));
        let (progress_tx, progress_rx) = mpsc::channel(channels.progress_capacity.max(1));

        let worker_state = Worker {
            request_rx,
            response_tx,
            progress_tx,
            coordinator: Arc::new(SearchCoordinator::new()),
            search,
        };

        let worker: JoinHandle<()> = tokio::spawn(worker_state.run());

        Self {
            request_tx,
            response_rx,
            progress_rx,
            progress_closed: false,
            worker,
        }
    }

    /// Submit one request without blocking. A full channel surfaces as
    /// [`AppError::ChannelFull`]; retrying or dropping is the caller's
    /// decision.
    pub fn submit(&self, request: Request) -> Result<(), AppError> {
        self.request_tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => AppError::ChannelFull,
            TrySendError::Closed(_) => AppError::ChannelClosed,
        })
    }

    /// Non-blocking drain of the response channel, one item per call.
    pub fn try_recv_response(&mut self) -> Option<Response> {
        self.response_rx.try_recv().ok()
    }

    /// Non-blocking drain of the progress channel, one item per call.
    pub fn try_recv_progress(&mut self) -> Option<Progress> {
        self.progress_rx.try_recv().ok()
    }

    /// Await the next event from either output channel. Returns `None` once
    /// the worker is gone and both channels are drained.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            if self.progress_closed {
                return self.response_rx.recv().await.map(Event::Response);
            }

            tokio::select! {
                response = self.response_rx.recv() => {
                    return response.map(Event::Response);
                }

                progress = self.progress_rx.recv() => {
                    match progress {
                        Some(p) => return Some(Event::Progress(p)),
                        None => self.progress_closed = true,
                    }
                }
            }
        }
    }

    /// Close the request channel and wait for the worker to drain and exit.
    pub async fn shutdown(self) {
        drop(self.request_tx);
        let _ = self.worker.await;
    }
}

// ----------------------------------------------------------------------------
// Worker loop
// ----------------------------------------------------------------------------

struct Worker {
    request_rx: Receiver<Request>,

    response_tx: Sender<Response>,

    progress_tx: Sender<Progress>,

    coordinator: Arc<SearchCoordinator>,

    search: SearchConfig,
}

impl Worker {
    /// Pull one request at a time until the request channel closes. A failed
    /// request produces an error Response and the loop continues; nothing
    /// here terminates the loop early.
    async fn run(mut self) {
        info!("Scan worker started");

        while let Some(request) = self.request_rx.recv().await {
            match request.op {
                Operation::FetchDir => self.handle_fetch_dir(request).await,

                Operation::SearchDir => self.handle_search_dir(request),

                Operation::CancelSearch => {
                    debug!("Cancel requested");
                    self.coordinator.cancel();
                }
            }
        }

        // Request side closed: abort any in-flight walk before exiting.
        self.coordinator.cancel();
        info!("Scan worker stopped");
    }

    /// Listing runs inline: its latency is bounded by one directory's
    /// fan-out, so the loop stays responsive without a second task.
    #[instrument(skip_all, fields(generation = request.generation, path = %request.path.display()))]
    async fn handle_fetch_dir(&self, request: Request) {
        let response: Response = match lister::list_directory(&request.path).await {
            Ok(entries) => Response::success(&request, entries),
            Err(e) => Response::failure(&request, e),
        };

        deliver_response(&self.response_tx, response);
    }

    /// Searches are dispatched onto their own task so the loop keeps
    /// servicing CancelSearch while the walk runs. The coordinator's
    /// begin-replaces-previous rule keeps at most one walk live.
    #[instrument(skip_all, fields(generation = request.generation, query = %request.query))]
    fn handle_search_dir(&self, request: Request) {
        let (seq, token) = self.coordinator.begin();

        let coordinator: Arc<SearchCoordinator> = Arc::clone(&self.coordinator);
        let response_tx: Sender<Response> = self.response_tx.clone();
        let progress_tx: Sender<Progress> = self.progress_tx.clone();
        let config: SearchConfig = self.search.clone();

        tokio::spawn(async move {
            let generation: u64 = request.generation;

            let emit = move |current: u64, label: CompactString| {
                let update = Progress {
                    generation,
                    current,
                    total: 0,
                    label,
                };

                // A full progress channel drops the update rather than
                // stalling the walk.
                let _ = progress_tx.try_send(update);
            };

            let external_cmd: Option<String> = request
                .external_cmd
                .clone()
                .or_else(|| config.external_cmd.clone());

            let result: Result<SearchOutcome, AppError> = search::run_search(
                &request.path,
                &request.query,
                request.depth,
                request.engine,
                external_cmd.as_deref(),
                config.progress_interval,
                token,
                emit,
            )
            .await;

            coordinator.finish(seq);

            let response: Response = match result {
                Ok(outcome) if outcome.cancelled => Response::aborted(&request),
                Ok(outcome) => Response::success(&request, outcome.entries),
                Err(e) => Response::failure(&request, e),
            };

            deliver_response(&response_tx, response);
        });
    }
}

fn deliver_response(tx: &Sender<Response>, response: Response) {
    match tx.try_send(response) {
        Ok(()) => {}

        Err(TrySendError::Full(dropped)) => {
            warn!(
                generation = dropped.generation,
                "Response channel full, dropping terminal response"
            );
        }

        Err(TrySendError::Closed(_)) => {
            debug!("Response channel closed, consumer gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_system() -> System {
        System::spawn(
            SearchConfig {
                progress_interval: Duration::ZERO,
                ..SearchConfig::default()
            },
            &ChannelConfig::default(),
        )
    }

    fn small_fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("dir1")).unwrap();
        std::fs::write(tmp.path().join("dir1/nested.txt"), b"nested").unwrap();
        std::fs::write(tmp.path().join("file1.txt"), b"one").unwrap();
        std::fs::write(tmp.path().join(".hidden"), b"dot").unwrap();
        tmp
    }

    /// A tree wide and deep enough that a walk spans many directory visits.
    fn large_fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        for a in 0..12 {
            let outer = tmp.path().join(format!("outer{a:02}"));
            std::fs::create_dir(&outer).unwrap();
            for b in 0..8 {
                let inner = outer.join(format!("inner{b:02}"));
                std::fs::create_dir(&inner).unwrap();
                for c in 0..4 {
                    std::fs::write(inner.join(format!("leaf{c}.txt")), b"x").unwrap();
                }
            }
        }
        tmp
    }

    async fn wait_response(system: &mut System) -> Response {
        loop {
            match system.next_event().await {
                Some(Event::Response(r)) => return r,
                Some(Event::Progress(_)) => {}
                None => panic!("worker exited without a terminal response"),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fetch_dir_end_to_end() {
        let tmp = small_fixture();
        let mut system = test_system();

        system
            .submit(Request::fetch_dir(1, tmp.path().to_path_buf()))
            .unwrap();

        let response = wait_response(&mut system).await;

        assert_eq!(response.generation, 1);
        assert!(response.error.is_none());
        assert!(!response.cancelled);

        let names: Vec<&str> = response.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["dir1", ".hidden", "file1.txt"]);
        assert!(response.entries[0].is_dir);

        system.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fetch_dir_error_keeps_worker_alive() {
        let tmp = small_fixture();
        let mut system = test_system();

        system
            .submit(Request::fetch_dir(1, tmp.path().join("missing")))
            .unwrap();

        let first = wait_response(&mut system).await;
        assert_eq!(first.generation, 1);
        assert!(matches!(first.error, Some(AppError::NotFound(_))));
        assert!(first.entries.is_empty());

        // The loop must keep serving after a failed request.
        system
            .submit(Request::fetch_dir(2, tmp.path().to_path_buf()))
            .unwrap();

        let second = wait_response(&mut system).await;
        assert_eq!(second.generation, 2);
        assert!(second.error.is_none());

        system.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_explicit_cancel_yields_cancelled_response() {
        let tmp = large_fixture();
        let mut system = test_system();

        system
            .submit(Request::search_dir(
                1,
                tmp.path().to_path_buf(),
                "leaf".to_string(),
                8,
            ))
            .unwrap();
        system.submit(Request::cancel_search()).unwrap();

        let response = wait_response(&mut system).await;

        assert_eq!(response.generation, 1);
        assert!(response.cancelled);
        assert!(response.error.is_none());
        assert!(response.entries.is_empty());

        system.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_new_search_implicitly_cancels_previous() {
        let tmp = large_fixture();
        let mut system = test_system();

        system
            .submit(Request::search_dir(
                1,
                tmp.path().to_path_buf(),
                "leaf".to_string(),
                8,
            ))
            .unwrap();
        system
            .submit(Request::search_dir(
                2,
                tmp.path().to_path_buf(),
                "leaf0".to_string(),
                8,
            ))
            .unwrap();

        let mut got_g1 = false;
        let mut got_g2 = false;

        while !(got_g1 && got_g2) {
            let response = wait_response(&mut system).await;
            match response.generation {
                1 => {
                    assert!(response.cancelled, "superseded search must be cancelled");
                    assert!(response.entries.is_empty());
                    got_g1 = true;
                }
                2 => {
                    assert!(!response.cancelled);
                    assert!(response.error.is_none());
                    assert!(!response.entries.is_empty());
                    got_g2 = true;
                }
                other => panic!("unexpected generation {other}"),
            }
        }

        system.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_search_emits_progress() {
        let tmp = large_fixture();
        let mut system = test_system();

        system
            .submit(Request::search_dir(
                7,
                tmp.path().to_path_buf(),
                "leaf".to_string(),
                8,
            ))
            .unwrap();

        let mut saw_progress = false;
        loop {
            match system.next_event().await {
                Some(Event::Progress(p)) => {
                    assert_eq!(p.generation, 7);
                    assert!(!p.label.is_empty());
                    saw_progress = true;
                }
                Some(Event::Response(r)) => {
                    assert_eq!(r.generation, 7);
                    break;
                }
                None => panic!("worker exited early"),
            }
        }

        assert!(saw_progress, "expected at least one progress update");

        system.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unavailable_content_engine_is_error_response() {
        let tmp = small_fixture();
        let mut system = test_system();

        let request = Request::search_dir(3, tmp.path().to_path_buf(), "needle".to_string(), 4)
            .with_engine(EngineSelector::Ripgrep)
            .with_external_cmd(Some("definitely-not-installed-anywhere-7f3a".to_string()));
        system.submit(request).unwrap();

        let response = wait_response(&mut system).await;

        assert_eq!(response.generation, 3);
        assert!(matches!(
            response.error,
            Some(AppError::CommandUnavailable(_))
        ));
        assert!(response.entries.is_empty());
        assert!(!response.cancelled);

        system.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_without_search_is_a_no_op() {
        let tmp = small_fixture();
        let mut system = test_system();

        system.submit(Request::cancel_search()).unwrap();
        system
            .submit(Request::fetch_dir(1, tmp.path().to_path_buf()))
            .unwrap();

        let response = wait_response(&mut system).await;
        assert_eq!(response.generation, 1);
        assert!(response.error.is_none());

        system.shutdown().await;
    }

    #[test]
    fn test_coordinator_begin_replaces_and_cancels() {
        let coordinator = SearchCoordinator::new();

        let (seq1, token1) = coordinator.begin();
        assert!(coordinator.is_running());
        assert!(!token1.is_cancelled());

        let (seq2, token2) = coordinator.begin();
        assert!(token1.is_cancelled());
        assert!(!token2.is_cancelled());
        assert_ne!(seq1, seq2);

        // An old walk finishing must not clear the new handle.
        coordinator.finish(seq1);
        assert!(coordinator.is_running());

        coordinator.finish(seq2);
        assert!(!coordinator.is_running());
    }

    #[test]
    fn test_coordinator_cancel_clears_handle() {
        let coordinator = SearchCoordinator::new();

        let (_seq, token) = coordinator.begin();
        coordinator.cancel();

        assert!(token.is_cancelled());
        assert!(!coordinator.is_running());

        // Idempotent.
        coordinator.cancel();
    }

    fn path_of(entry: &Entry) -> &Path {
        entry.path.as_ref()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_search_results_are_descendants_of_root() {
        let tmp = small_fixture();
        let mut system = test_system();

        system
            .submit(Request::search_dir(
                5,
                tmp.path().to_path_buf(),
                "nested".to_string(),
                4,
            ))
            .unwrap();

        let response = wait_response(&mut system).await;
        assert_eq!(response.entries.len(), 1);

        let root = std::fs::canonicalize(tmp.path()).unwrap();
        assert!(path_of(&response.entries[0]).starts_with(&root));

        system.shutdown().await;
    }
}
