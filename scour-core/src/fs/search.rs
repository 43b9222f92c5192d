//! `src/fs/search.rs`
//! ============================================================================
//! # Search Engine: Bounded-Depth Recursive Walk
//!
//! Walks the subtree rooted at a request path up to a bounded depth,
//! applying the name matcher or delegating content queries to an external
//! engine. The walk consults the path classifier before descending into any
//! directory, polls the cancellation token at directory granularity, and
//! emits throttled progress that never blocks the walk.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use compact_str::CompactString;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::error::AppError;
use crate::fs::classifier;
use crate::fs::content::{self, ContentHits, EngineSelector};
use crate::fs::entry::Entry;
use crate::fs::matcher::NameMatcher;
use crate::util::humanize::format_count;

/// Result of one search run. `cancelled` outcomes always carry zero
/// entries: partial result sets are discarded, never surfaced.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub entries: Vec<Entry>,

    pub cancelled: bool,
}

/// Run one search to completion, cancellation, or error.
///
/// `depth` counts levels below the root; 0 or negative means the root
/// directory only. `emit` receives `(current, label)` pairs already
/// throttled to `progress_interval`; `current` is monotonically
/// non-decreasing within the run.
#[instrument(skip_all, fields(query = %query, root = %root.display(), depth = depth))]
pub async fn run_search<F>(
    root: &Path,
    query: &str,
    depth: i32,
    engine: EngineSelector,
    external_cmd: Option<&str>,
    progress_interval: Duration,
    cancel: CancellationToken,
    emit: F,
) -> Result<SearchOutcome, AppError>
where
    F: Fn(u64, CompactString) + Send + Sync + 'static,
{
    if query.trim().is_empty() {
        return Err(AppError::invalid_input("query", "empty"));
    }

    let abs: PathBuf = fs::canonicalize(root)
        .await
        .map_err(|_| AppError::NotFound(root.to_path_buf()))?;

    match engine {
        EngineSelector::Names => {
            let matcher: NameMatcher = NameMatcher::new(query)?;

            // The walk is synchronous filesystem iteration; keep it off the
            // async workers.
            let outcome: SearchOutcome = tokio::task::spawn_blocking(move || {
                walk_names(
                    &abs,
                    &matcher,
                    depth,
                    classifier::should_skip,
                    &cancel,
                    progress_interval,
                    emit,
                )
            })
            .await
            .map_err(|e: tokio::task::JoinError| {
                AppError::Other(format!("search walk task failed: {e}"))
            })?;

            Ok(outcome)
        }

        _ => {
            let mut last_emit: Instant = Instant::now();

            let hits: ContentHits = content::run_content_search(
                engine,
                external_cmd,
                query,
                &abs,
                depth,
                &cancel,
                move |seen: u64| {
                    if last_emit.elapsed() >= progress_interval {
                        emit(
                            seen,
                            CompactString::new(format!("Matched {} files…", format_count(seen))),
                        );
                        last_emit = Instant::now();
                    }
                },
            )
            .await?;

            Ok(SearchOutcome {
                entries: hits.entries,
                cancelled: hits.cancelled,
            })
        }
    }
}

/// Filename walk over the subtree. `skip` is injected so tests can exercise
/// pruning without touching the real deny-list roots.
fn walk_names<F>(
    root: &Path,
    matcher: &NameMatcher,
    depth: i32,
    skip: fn(&Path) -> bool,
    cancel: &CancellationToken,
    progress_interval: Duration,
    emit: F,
) -> SearchOutcome
where
    F: Fn(u64, CompactString),
{
    // Walk depth 0 is the root itself; entry depth d+1 is "d levels below".
    let max_depth: usize = usize::try_from(depth.max(0)).unwrap_or(0) + 1;

    let mut it = WalkDir::new(root).max_depth(max_depth).into_iter();

    let mut entries: Vec<Entry> = Vec::new();
    let mut visited: u64 = 0;
    let mut last_emit: Instant = Instant::now();

    while let Some(item) = it.next() {
        let dirent = match item {
            Ok(d) => d,

            Err(e) => {
                // Unreadable subtree degrades to a gap in the results, not
                // a failed search.
                debug!("Walk error: {}", e);
                continue;
            }
        };

        if dirent.file_type().is_dir() {
            // Directory-visit granularity: cancellation latency is bounded
            // by one directory's fan-out.
            if cancel.is_cancelled() {
                debug!("Search cancelled after {} entries", visited);
                return SearchOutcome {
                    entries: Vec::new(),
                    cancelled: true,
                };
            }

            if skip(dirent.path()) {
                it.skip_current_dir();
                continue;
            }
        }

        // The root's own entry never appears in results.
        if dirent.depth() == 0 {
            continue;
        }

        visited += 1;

        let name: &str = dirent.file_name().to_str().unwrap_or("");
        if matcher.matches(name) {
            entries.push(Entry::from_path_sync(dirent.path()));
        }

        if last_emit.elapsed() >= progress_interval {
            emit(
                visited,
                CompactString::new(format!("Scanned {} files…", format_count(visited))),
            );
            last_emit = Instant::now();
        }
    }

    SearchOutcome {
        entries,
        cancelled: false,
    }
}
