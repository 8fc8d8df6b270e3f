//! Chaining stages into a pipeline.

use super::transform::{ConcurrentTransform, DEFAULT_CHANNEL_CAPACITY, StageStats, feed};
use crate::{Error, Result};
use std::time::Instant;
use tokio::sync::mpsc;

/// Items that made it through a pipeline, plus per-stage counts.
#[derive(Debug)]
pub struct PipelineOutput<I> {
    /// Items forwarded by the last stage, in completion order.
    pub items: Vec<I>,
    /// Stats for each stage, in pipeline order.
    pub stats: Vec<StageStats>,
}

/// An ordered chain of [`ConcurrentTransform`] stages.
///
/// Every stage runs as its own task; items move between stages over bounded
/// channels, so a slow stage applies backpressure upstream. The first stage
/// error fails the whole run.
///
/// # Example
///
/// ```rust
/// use labelgate::pipeline::{ConcurrentTransform, Pipeline};
///
/// # #[tokio::main]
/// # async fn main() -> labelgate::Result<()> {
/// let output = Pipeline::new()
///     .stage(ConcurrentTransform::from_fn("double", |n: u32| Ok(Some(n * 2))))
///     .stage(ConcurrentTransform::from_fn("small", |n: u32| Ok((n < 6).then_some(n))))
///     .run(vec![1, 2, 3, 4])
///     .await?;
///
/// let mut items = output.items;
/// items.sort_unstable();
/// assert_eq!(items, vec![2, 4]);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<I> {
    stages: Vec<ConcurrentTransform<I>>,
    channel_capacity: usize,
}

impl<I: Send + 'static> Pipeline<I> {
    /// Creates an empty pipeline.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stages: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, stage: ConcurrentTransform<I>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the capacity of the channel feeding the first stage.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the stage names in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(ConcurrentTransform::name).collect()
    }

    /// Pushes `items` through every stage and collects the survivors.
    ///
    /// # Errors
    ///
    /// Returns the first stage error, in pipeline order.
    pub async fn run(self, items: Vec<I>) -> Result<PipelineOutput<I>> {
        let start = Instant::now();
        let total = items.len();

        let (tx, mut rx) = mpsc::channel(self.channel_capacity);
        let feeder = tokio::spawn(feed(items, tx));

        let mut tasks = Vec::with_capacity(self.stages.len());
        for stage in self.stages {
            let handle = stage.spawn(rx);
            rx = handle.output;
            tasks.push(handle.task);
        }

        let mut survivors = Vec::new();
        while let Some(item) = rx.recv().await {
            survivors.push(item);
        }

        let mut stats = Vec::with_capacity(tasks.len());
        let mut failure = None;
        for task in tasks {
            match task.await {
                Ok(Ok(stage_stats)) => stats.push(stage_stats),
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                },
                Err(e) => {
                    failure.get_or_insert(Error::OperationFailed {
                        operation: "pipeline_join".to_string(),
                        cause: e.to_string(),
                    });
                },
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        feeder.await.map_err(|e| Error::OperationFailed {
            operation: "pipeline_feed".to_string(),
            cause: e.to_string(),
        })?;

        tracing::info!(
            items_in = total,
            items_out = survivors.len(),
            stages = stats.len(),
            duration_ms = %start.elapsed().as_millis(),
            "Pipeline run completed"
        );

        Ok(PipelineOutput {
            items: survivors,
            stats,
        })
    }
}

impl<I: Send + 'static> Default for Pipeline<I> {
    fn default() -> Self {
        Self::new()
    }
}
