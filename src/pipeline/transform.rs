//! Bounded-concurrency item transforms.
//!
//! A [`ConcurrentTransform`] turns a per-item function into a pipeline stage.
//! Items are pulled from an input channel and processed on tokio's blocking
//! pool, with at most `max_concurrent` items in flight at once. Each result
//! decides the item's fate:
//!
//! | Result | Effect |
//! |--------|--------|
//! | `Ok(Some(item))` | Item is forwarded downstream |
//! | `Ok(None)` | Item is dropped from the pipeline |
//! | `Err(e)` | Stage fails, in-flight work is aborted, output is closed |
//!
//! Items finish in whatever order their work completes; only a stage with
//! `max_concurrent == 1` preserves input order. A task's permit is released
//! only after its result has been forwarded, so the next item cannot start
//! before the previous one is downstream.

use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// Default number of items processed concurrently by a stage.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Default buffer size of a stage's output channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A finished item's result together with the permit it ran under.
type Completed<I> = (OwnedSemaphorePermit, Result<Option<I>>);

/// A per-item pipeline step.
pub trait Transform<I>: Send + Sync {
    /// Stage name used in logs, metrics and errors.
    fn name(&self) -> &str;

    /// Processes one item.
    ///
    /// Return `Ok(Some(item))` to forward, `Ok(None)` to drop.
    fn apply(&self, item: I) -> Result<Option<I>>;

    /// Called once after every item has been processed successfully.
    fn finish(&self) -> Result<()> {
        Ok(())
    }
}

/// Adapts a closure into a [`Transform`].
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> FnTransform<F> {
    /// Wraps `f` under the given stage name.
    #[must_use]
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<I, F> Transform<I> for FnTransform<F>
where
    F: Fn(I) -> Result<Option<I>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, item: I) -> Result<Option<I>> {
        (self.f)(item)
    }
}

/// Configuration for a [`ConcurrentTransform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformConfig {
    /// Maximum items processed at once. Values below 1 are treated as 1.
    pub max_concurrent: usize,
    /// Capacity of the output channel.
    pub channel_capacity: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Item counts reported by a finished stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageStats {
    /// Stage name.
    pub stage: String,
    /// Items pulled from the input.
    pub received: u64,
    /// Items sent downstream.
    pub forwarded: u64,
    /// Items filtered out.
    pub dropped: u64,
}

impl StageStats {
    fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            ..Self::default()
        }
    }
}

/// A running stage: its output channel and the task driving it.
pub struct StageHandle<I> {
    /// Items forwarded by the stage.
    pub output: mpsc::Receiver<I>,
    /// Resolves once the stage has drained its input.
    pub task: JoinHandle<Result<StageStats>>,
}

impl<I> StageHandle<I> {
    /// Drains the output, then waits for the stage to finish.
    pub async fn collect(mut self) -> Result<(Vec<I>, StageStats)> {
        let mut items = Vec::new();
        while let Some(item) = self.output.recv().await {
            items.push(item);
        }
        let stats = self.task.await.map_err(|e| join_error("stage", &e))??;
        Ok((items, stats))
    }
}

/// A [`Transform`] run with a concurrency cap.
pub struct ConcurrentTransform<I> {
    inner: Arc<dyn Transform<I>>,
    config: TransformConfig,
}

impl<I> Clone for ConcurrentTransform<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config,
        }
    }
}

impl<I: Send + 'static> ConcurrentTransform<I> {
    /// Wraps a transform with the default configuration.
    #[must_use]
    pub fn new<T: Transform<I> + 'static>(transform: T) -> Self {
        Self::with_config(transform, TransformConfig::default())
    }

    /// Wraps a transform with an explicit configuration.
    #[must_use]
    pub fn with_config<T: Transform<I> + 'static>(transform: T, config: TransformConfig) -> Self {
        Self {
            inner: Arc::new(transform),
            config,
        }
    }

    /// Wraps a closure.
    ///
    /// # Example
    ///
    /// ```rust
    /// use labelgate::pipeline::ConcurrentTransform;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> labelgate::Result<()> {
    /// let evens = ConcurrentTransform::from_fn("evens", |n: u32| Ok((n % 2 == 0).then_some(n)));
    /// let mut out = evens.run(vec![1, 2, 3, 4]).await?;
    /// out.sort_unstable();
    /// assert_eq!(out, vec![2, 4]);
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(I) -> Result<Option<I>> + Send + Sync + 'static,
    {
        Self::new(FnTransform::new(name, f))
    }

    /// Sets the concurrency cap (minimum 1).
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.config.max_concurrent = max.max(1);
        self
    }

    /// Sets the output channel capacity (minimum 1).
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity.max(1);
        self
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the effective concurrency cap.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent.max(1)
    }

    /// Starts the stage on the current tokio runtime.
    pub fn spawn(self, input: mpsc::Receiver<I>) -> StageHandle<I> {
        let (tx, output) = mpsc::channel(self.config.channel_capacity.max(1));
        let max_concurrent = self.max_concurrent();
        let task = tokio::spawn(drive(self.inner, max_concurrent, input, tx));
        StageHandle { output, task }
    }

    /// Runs `items` through this stage alone and collects what it forwards.
    pub async fn run(self, items: Vec<I>) -> Result<Vec<I>> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let handle = self.spawn(rx);
        let feeder = tokio::spawn(feed(items, tx));

        let (items, _) = handle.collect().await?;
        feeder.await.map_err(|e| join_error("feed", &e))?;
        Ok(items)
    }
}

/// Sends `items` into a stage input, stopping early if the stage went away.
pub(crate) async fn feed<I>(items: Vec<I>, tx: mpsc::Sender<I>) {
    for item in items {
        if tx.send(item).await.is_err() {
            break;
        }
    }
}

async fn drive<I: Send + 'static>(
    transform: Arc<dyn Transform<I>>,
    max_concurrent: usize,
    mut input: mpsc::Receiver<I>,
    output: mpsc::Sender<I>,
) -> Result<StageStats> {
    let stage = transform.name().to_string();
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let mut tasks: JoinSet<Completed<I>> = JoinSet::new();
    let mut stats = StageStats::new(&stage);
    let mut open = true;

    tracing::debug!(stage = %stage, max_concurrent, "Stage started");

    while open || !tasks.is_empty() {
        tokio::select! {
            biased;

            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                let (permit, result) = match joined {
                    Ok((permit, result)) => (Some(permit), Ok(result)),
                    Err(e) => (None, Err(e)),
                };
                let Some(outcome) = settle(&stage, result, &mut tasks, &mut stats)? else {
                    continue;
                };
                if output.send(outcome).await.is_err() {
                    tracing::debug!(stage = %stage, "Downstream closed, stopping stage");
                    tasks.abort_all();
                    return Ok(stats);
                }
                drop(permit);
            },
            received = input.recv(), if open && semaphore.available_permits() > 0 => {
                let Some(item) = received else {
                    open = false;
                    continue;
                };
                stats.received += 1;

                let permit = Arc::clone(&semaphore)
                    .try_acquire_owned()
                    .map_err(|e| Error::OperationFailed {
                        operation: format!("{stage}_acquire"),
                        cause: e.to_string(),
                    })?;
                let transform = Arc::clone(&transform);
                tasks.spawn_blocking(move || (permit, transform.apply(item)));
            },
        }
    }

    let finisher = Arc::clone(&transform);
    tokio::task::spawn_blocking(move || finisher.finish())
        .await
        .map_err(|e| join_error(&stage, &e))??;

    tracing::debug!(
        stage = %stage,
        received = stats.received,
        forwarded = stats.forwarded,
        dropped = stats.dropped,
        "Stage finished"
    );

    Ok(stats)
}

/// Records one finished item, returning it if it should be forwarded.
fn settle<I, T: 'static>(
    stage: &str,
    joined: std::result::Result<Result<Option<I>>, JoinError>,
    tasks: &mut JoinSet<T>,
    stats: &mut StageStats,
) -> Result<Option<I>> {
    let outcome = joined
        .map_err(|e| join_error(stage, &e))
        .and_then(|result| result);

    match outcome {
        Ok(Some(item)) => {
            stats.forwarded += 1;
            metrics::counter!("labelgate_items_total", "stage" => stage.to_string(), "outcome" => "forwarded")
                .increment(1);
            Ok(Some(item))
        },
        Ok(None) => {
            stats.dropped += 1;
            metrics::counter!("labelgate_items_total", "stage" => stage.to_string(), "outcome" => "dropped")
                .increment(1);
            Ok(None)
        },
        Err(e) => {
            tasks.abort_all();
            metrics::counter!("labelgate_stage_failures_total", "stage" => stage.to_string())
                .increment(1);
            tracing::warn!(stage = %stage, error = %e, "Stage failed");
            Err(e)
        },
    }
}

fn join_error(stage: &str, e: &JoinError) -> Error {
    Error::OperationFailed {
        operation: format!("{stage}_join"),
        cause: e.to_string(),
    }
}
