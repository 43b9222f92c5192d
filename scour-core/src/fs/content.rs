//! `src/fs/content.rs`
//! ============================================================================
//! # Content Search: External Engine Delegation
//!
//! Content matching is delegated to an installed line-oriented search binary
//! rather than reimplemented in-process; the worker only needs the exit
//! status and the matched file paths. Each supported engine is one
//! [`ContentSearcher`] implementation, selected at call time by the
//! request's [`EngineSelector`]. A missing or failing binary is a terminal
//! error, never a silent empty result.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::fs::entry::Entry;

/// Which engine a request wants. `Names` routes around content search
/// entirely; `Auto` probes the preference order below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineSelector {
    /// Filename matching only; no external engine involved.
    #[default]
    Names,

    /// First available of the supported engines, preference order rg, grep.
    Auto,

    Ripgrep,

    Grep,
}

/// Result of one content search run. A cancelled run discards its partial
/// entries so the caller never renders a misleading half result.
#[derive(Debug, Default)]
pub struct ContentHits {
    pub entries: Vec<Entry>,

    pub cancelled: bool,
}

/// One supported external engine: how to invoke it and how to read its
/// exit status. Process management stays in [`run_content_search`].
#[async_trait]
pub trait ContentSearcher: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn default_binary(&self) -> &'static str;

    /// Build the invocation printing one matching file path per line.
    fn build_command(&self, binary: &str, query: &str, root: &Path, depth: i32) -> Command;

    /// Exit status meaning "ran fine, found nothing".
    fn is_no_match_status(&self, status: ExitStatus) -> bool {
        status.code() == Some(1)
    }

    async fn is_available(&self, binary: &str) -> bool {
        check_command_availability(binary).await
    }
}

#[derive(Debug)]
pub struct RipgrepSearcher;

#[async_trait]
impl ContentSearcher for RipgrepSearcher {
    fn name(&self) -> &'static str {
        "ripgrep"
    }

    fn default_binary(&self) -> &'static str {
        "rg"
    }

    fn build_command(&self, binary: &str, query: &str, root: &Path, depth: i32) -> Command {
        let mut cmd: Command = Command::new(binary);

        // rg counts depth from the given path: 1 covers the root's own
        // files, matching a depth-0 walk.
        cmd.arg("--files-with-matches")
            .arg("--no-messages")
            .arg("--max-depth")
            .arg((i64::from(depth.max(0)) + 1).to_string())
            .arg("--")
            .arg(query)
            .arg(root);

        cmd
    }
}

#[derive(Debug)]
pub struct GrepSearcher;

#[async_trait]
impl ContentSearcher for GrepSearcher {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn default_binary(&self) -> &'static str {
        "grep"
    }

    fn build_command(&self, binary: &str, query: &str, root: &Path, _depth: i32) -> Command {
        let mut cmd: Command = Command::new(binary);

        // POSIX grep has no depth flag; its own traversal bounds the walk.
        cmd.arg("-r").arg("-l").arg("-I").arg("-s").arg("--").arg(query).arg(root);

        cmd
    }
}

static RIPGREP: RipgrepSearcher = RipgrepSearcher;
static GREP: GrepSearcher = GrepSearcher;

#[inline]
async fn check_command_availability(cmd: &str) -> bool {
    Command::new(cmd)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status: ExitStatus| status.success())
        .unwrap_or(false)
}

/// Resolve the selector to a concrete engine plus the binary to invoke,
/// probing availability up front so a missing install fails before the walk
/// starts.
async fn resolve_searcher(
    selector: EngineSelector,
    external_cmd: Option<&str>,
) -> Result<(&'static dyn ContentSearcher, String), AppError> {
    let explicit: &'static dyn ContentSearcher = match selector {
        EngineSelector::Names => {
            return Err(AppError::invalid_input(
                "engine",
                "content search requested with the name-only selector",
            ));
        }

        EngineSelector::Auto => {
            let candidates: SmallVec<[&'static dyn ContentSearcher; 2]> =
                smallvec![&RIPGREP as &dyn ContentSearcher, &GREP as &dyn ContentSearcher];

            for searcher in candidates {
                let binary: &str = external_cmd.unwrap_or_else(|| searcher.default_binary());

                if searcher.is_available(binary).await {
                    debug!("Selected content engine {} ({})", searcher.name(), binary);
                    return Ok((searcher, binary.to_string()));
                }
            }

            return Err(AppError::command_unavailable("content engines (rg, grep)"));
        }

        EngineSelector::Ripgrep => &RIPGREP,
        EngineSelector::Grep => &GREP,
    };

    let binary: &str = external_cmd.unwrap_or_else(|| explicit.default_binary());

    if !explicit.is_available(binary).await {
        return Err(AppError::command_unavailable(binary));
    }

    Ok((explicit, binary.to_string()))
}

/// Run one content search under the given cancellation token.
///
/// Streams the engine's stdout line by line, converting each matched file
/// path to an [`Entry`]. The `progress` callback receives the running hit
/// count; throttling and delivery are the caller's concern.
pub async fn run_content_search(
    selector: EngineSelector,
    external_cmd: Option<&str>,
    query: &str,
    root: &Path,
    depth: i32,
    cancel: &CancellationToken,
    mut progress: impl FnMut(u64) + Send,
) -> Result<ContentHits, AppError> {
    let (searcher, binary) = resolve_searcher(selector, external_cmd).await?;

    let mut child: Child = searcher
        .build_command(&binary, query, root, depth)
        .kill_on_drop(true)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e: std::io::Error| AppError::ExternalCmd {
            cmd: binary.clone(),
            code: None,
            stderr: e.to_string(),
        })?;

    let stdout: ChildStdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Other("stdout must be piped".to_string()))?;
    let mut reader: Lines<BufReader<ChildStdout>> = BufReader::new(stdout).lines();

    let mut entries: Vec<Entry> = Vec::with_capacity(128);
    let mut seen: u64 = 0;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = child.kill().await;

                debug!("Content search cancelled after {} hits", seen);
                return Ok(ContentHits { entries: Vec::new(), cancelled: true });
            }

            line = reader.next_line() => match line {
                Ok(Some(line)) => {
                    let line: &str = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    seen += 1;
                    entries.push(Entry::from_path_async(Path::new(line)).await);
                    progress(seen);
                }

                Ok(None) => break,

                Err(e) => {
                    warn!("Stream read error from {}: {}", binary, e);
                    break;
                }
            }
        }
    }

    let mut stderr_buf: String = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut stderr_buf).await;
    }

    let status: ExitStatus = child.wait().await.map_err(|e: std::io::Error| {
        AppError::ExternalCmd {
            cmd: binary.clone(),
            code: None,
            stderr: e.to_string(),
        }
    })?;

    if !status.success() && !searcher.is_no_match_status(status) {
        return Err(AppError::ExternalCmd {
            cmd: binary,
            code: status.code(),
            stderr: stderr_buf,
        });
    }

    Ok(ContentHits {
        entries,
        cancelled: false,
    })
}
