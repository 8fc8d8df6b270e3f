//! The three labeling stages.
//!
//! All stages share one [`RecordStore`] and pass null items straight through.

use super::hasher::ContentHasher;
use crate::config::{DumpPolicy, LabelgateConfig};
use crate::models::PipelineItem;
use crate::pipeline::{ConcurrentTransform, DEFAULT_MAX_CONCURRENT, Transform};
use crate::storage::RecordStore;
use crate::Result;
use std::sync::Arc;
use tracing::instrument;

/// Stage name of [`LabelStages::not_labeled`].
pub const NOT_LABELED_STAGE: &str = "not_labeled";
/// Stage name of [`LabelStages::label`].
pub const LABEL_STAGE: &str = "label";
/// Stage name of [`LabelStages::dump`].
pub const DUMP_STAGE: &str = "dump";

/// Factory for the labeling stages, bound to a shared record store.
///
/// # Example
///
/// ```rust,no_run
/// use labelgate::models::FileItem;
/// use labelgate::pipeline::Pipeline;
/// use labelgate::services::LabelStages;
/// use labelgate::storage::RecordStore;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> labelgate::Result<()> {
/// let stages = LabelStages::new(Arc::new(RecordStore::new("labeled.json")));
///
/// let output = Pipeline::new()
///     .stage(stages.not_labeled())
///     .stage(stages.label())
///     .stage(stages.dump())
///     .run(vec![FileItem::buffer("a.txt", "hello")])
///     .await?;
/// # let _ = output;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LabelStages {
    store: Arc<RecordStore>,
    max_concurrent: usize,
    dump_policy: DumpPolicy,
}

impl LabelStages {
    /// Creates stages over `store` with default concurrency and per-item dumps.
    #[must_use]
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self {
            store,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            dump_policy: DumpPolicy::default(),
        }
    }

    /// Creates stages and their record store from configuration.
    #[must_use]
    pub fn from_config(config: &LabelgateConfig) -> Self {
        Self::new(Arc::new(RecordStore::new(&config.record_path)))
            .with_max_concurrent(config.max_concurrent)
            .with_dump_policy(config.dump_policy)
    }

    /// Sets the concurrency of every stage built afterwards.
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Sets the dump stage policy.
    #[must_use]
    pub const fn with_dump_policy(mut self, policy: DumpPolicy) -> Self {
        self.dump_policy = policy;
        self
    }

    /// Returns the shared record store.
    #[must_use]
    pub const fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Builds the stage that drops items whose content is already labeled.
    #[must_use]
    pub fn not_labeled<I: PipelineItem>(&self) -> ConcurrentTransform<I> {
        ConcurrentTransform::new(NotLabeled {
            store: Arc::clone(&self.store),
        })
        .with_max_concurrent(self.max_concurrent)
    }

    /// Builds the stage that records each item's content hash.
    #[must_use]
    pub fn label<I: PipelineItem>(&self) -> ConcurrentTransform<I> {
        ConcurrentTransform::new(Label {
            store: Arc::clone(&self.store),
        })
        .with_max_concurrent(self.max_concurrent)
    }

    /// Builds the stage that writes the record file.
    #[must_use]
    pub fn dump<I: PipelineItem>(&self) -> ConcurrentTransform<I> {
        ConcurrentTransform::new(Dump {
            store: Arc::clone(&self.store),
            policy: self.dump_policy,
        })
        .with_max_concurrent(self.max_concurrent)
    }
}

struct NotLabeled {
    store: Arc<RecordStore>,
}

impl<I: PipelineItem> Transform<I> for NotLabeled {
    fn name(&self) -> &str {
        NOT_LABELED_STAGE
    }

    #[instrument(skip_all, fields(operation = "not_labeled", path = %item.path().display()))]
    fn apply(&self, item: I) -> Result<Option<I>> {
        let Some(hash) = ContentHasher::hash_item(&item)? else {
            return Ok(Some(item));
        };

        if self.store.contains(hash.as_str())? {
            tracing::debug!(hash = %hash, "Skipping already labeled item");
            return Ok(None);
        }
        Ok(Some(item))
    }
}

struct Label {
    store: Arc<RecordStore>,
}

impl<I: PipelineItem> Transform<I> for Label {
    fn name(&self) -> &str {
        LABEL_STAGE
    }

    #[instrument(skip_all, fields(operation = "label", path = %item.path().display()))]
    fn apply(&self, item: I) -> Result<Option<I>> {
        if let Some(hash) = ContentHasher::hash_item(&item)? {
            let inserted = self.store.add(hash.clone())?;
            tracing::debug!(hash = %hash, inserted, "Labeled item");
        }
        Ok(Some(item))
    }
}

struct Dump {
    store: Arc<RecordStore>,
    policy: DumpPolicy,
}

impl<I: PipelineItem> Transform<I> for Dump {
    fn name(&self) -> &str {
        DUMP_STAGE
    }

    #[instrument(skip_all, fields(operation = "dump", path = %item.path().display()))]
    fn apply(&self, item: I) -> Result<Option<I>> {
        if !item.is_null() && self.policy == DumpPolicy::PerItem {
            self.store.persist()?;
        }
        Ok(Some(item))
    }

    fn finish(&self) -> Result<()> {
        if self.policy == DumpPolicy::OnFinish {
            self.store.persist()?;
        }
        Ok(())
    }
}
