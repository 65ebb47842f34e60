//! Fetch queue and pipeline
//!
//! A bounded FIFO queue of [`FetchTask`]s feeds exactly one background
//! worker. The worker processes one task completely before taking the next,
//! so all downloads, extractions, and hook executions are serialized
//! globally — concurrent writes into the same destination directory cannot
//! happen. Tasks are held only in memory; anything still queued when the
//! process exits is lost.

use crate::commands::CommandRunner;
use crate::config::ArtifactConfig;
use crate::error::Result;
use crate::extract::ArchiveExtractor;
use crate::github::{Artifact, ArtifactClient};
use std::io::Write;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Queue capacity. Fixed — not configuration-dependent.
const QUEUE_CAPACITY: usize = 200;

/// One unit of work: fetch the artifacts of a workflow run for one target
///
/// The target configuration is a value copy taken at enqueue time.
#[derive(Clone, Debug)]
pub struct FetchTask {
    /// Workflow run identifier from the inbound event
    pub run_id: i64,
    /// The matched artifact target
    pub target: ArtifactConfig,
}

/// Bounded task queue with a single sequential consumer
pub struct Fetcher {
    tx: mpsc::Sender<FetchTask>,
    rx: Mutex<Option<mpsc::Receiver<FetchTask>>>,
    client: ArtifactClient,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Fetcher {
    /// Create a fetcher backed by the given API client
    ///
    /// The worker is not running until [`Fetcher::start`] is called.
    pub fn new(client: ArtifactClient) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            client,
            cancel: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }

    /// Enqueue a fetch task, waiting for space if the queue is full
    ///
    /// Backpressure, not rejection: a full queue blocks the caller (an HTTP
    /// handler, typically) until the worker frees a slot. Never errors toward
    /// the caller; a send on a closed queue only happens during shutdown and
    /// is logged and dropped.
    pub async fn enqueue(&self, task: FetchTask) {
        let run_id = task.run_id;
        let target = task.target.name.clone();
        if self.tx.send(task).await.is_err() {
            warn!(run_id, target = %target, "queue closed, dropping task");
            return;
        }
        info!(run_id, target = %target, "task enqueued");
    }

    /// Enqueue a fetch task without blocking
    ///
    /// Returns the task back if the queue is full or closed, for callers
    /// that must not stall.
    pub fn try_enqueue(&self, task: FetchTask) -> std::result::Result<(), FetchTask> {
        match self.tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(task))
            | Err(mpsc::error::TrySendError::Closed(task)) => Err(task),
        }
    }

    /// Number of tasks currently waiting in the queue
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Start the single background consumer
    ///
    /// Tasks are taken in FIFO order and each is processed to completion
    /// before the next is started. Calling `start` more than once has no
    /// effect.
    pub async fn start(&self) {
        let mut receiver = match self.rx.lock().await.take() {
            Some(rx) => rx,
            None => {
                warn!("fetch worker already started");
                return;
            }
        };

        let client = self.client.clone();
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            info!("fetch worker started");
            loop {
                tokio::select! {
                    task = receiver.recv() => match task {
                        Some(task) => fetch_run(&client, task.run_id, &task.target).await,
                        None => break,
                    },
                    _ = cancel.cancelled() => break,
                }
            }
            info!("fetch worker stopped");
        });

        *self.worker.lock().await = Some(handle);
    }

    /// Signal the consumer to exit after its current task and wait for it
    ///
    /// Queued, not-yet-started tasks are abandoned; there is no drain.
    /// An in-flight task is not interrupted.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "fetch worker task failed");
            }
        }
    }
}

/// Fetch all artifacts of one workflow run for one target
///
/// Lists the run's artifacts, then processes each in API order: expired
/// artifacts are skipped; before-hooks run first (their failures are logged
/// but do not stop the artifact); the archive is downloaded, staged to a
/// temp file, and extracted into the target's destination; after-hooks run
/// last. A list failure, or a download/extract failure on any artifact,
/// aborts the remainder of the run — artifacts already extracted stay on
/// disk. Note the asymmetry: hook failures are local, download failures are
/// run-fatal. Both behaviors are kept distinct on purpose.
pub async fn fetch_run(client: &ArtifactClient, run_id: i64, target: &ArtifactConfig) {
    info!(run_id, target = %target.name, repo = %target.repo, "requesting artifact list for run");

    let list = match client
        .list_artifacts(&target.repo, run_id, &target.github_token)
        .await
    {
        Ok(list) => list,
        Err(e) => {
            error!(run_id, repo = %target.repo, error = %e, "error listing artifacts");
            return;
        }
    };

    info!(run_id, count = list.artifacts.len(), "artifacts to download");

    for artifact in &list.artifacts {
        if artifact.expired {
            warn!(run_id, artifact = %artifact.name, "artifact is expired, skipping");
            continue;
        }

        let hook_env = artifact.hook_env();

        if target.before.is_empty() {
            debug!(run_id, artifact = %artifact.name, "no 'before' commands defined");
        } else {
            info!(run_id, artifact = %artifact.name, "running 'before' commands");
            CommandRunner::run_all(&target.before, &hook_env).await;
        }

        if let Err(e) = download_and_extract(client, artifact, target).await {
            error!(run_id, artifact = %artifact.name, error = %e, "error fetching artifact");
            return;
        }

        if target.after.is_empty() {
            debug!(run_id, artifact = %artifact.name, "no 'after' commands defined");
        } else {
            info!(run_id, artifact = %artifact.name, "running 'after' commands");
            CommandRunner::run_all(&target.after, &hook_env).await;
        }
    }
}

/// Download one artifact archive and unpack it into the target directory
///
/// The archive is staged to a transient temp file which is removed when this
/// function returns, extraction outcome notwithstanding.
async fn download_and_extract(
    client: &ArtifactClient,
    artifact: &Artifact,
    target: &ArtifactConfig,
) -> Result<()> {
    let mut staged = tempfile::NamedTempFile::new()?;
    debug!(tmpfile = %staged.path().display(), "staging downloaded archive");

    client
        .download(
            &artifact.archive_download_url,
            &target.github_token,
            &mut staged,
        )
        .await?;
    staged.flush()?;

    let extracted = ArchiveExtractor::extract(staged.as_file_mut(), &target.path)?;
    info!(
        artifact = %artifact.name,
        extracted,
        dest = %target.path.display(),
        "artifact unpacked"
    );
    Ok(())
}
