//! Execution log and chain-of-thought recorder.
//!
//! Append-only audit trail. Entries are never mutated or removed; each one
//! gets a sequence number under the write lock, so equal timestamps keep
//! their arrival order. Readers take a snapshot of shared pointers under a
//! short read lock and iterate it lock-free.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::models::{ChainOfThoughtEntry, LogEntry, LogLevel};
use crate::domain::ports::{AuditRecord, LogArchive};

pub struct ExecutionLog {
    entries: RwLock<Vec<Arc<LogEntry>>>,
    thoughts: RwLock<Vec<Arc<ChainOfThoughtEntry>>>,
    seq: AtomicU64,
    archive: Option<Arc<dyn LogArchive>>,
}

impl Default for ExecutionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            thoughts: RwLock::new(Vec::new()),
            seq: AtomicU64::new(1),
            archive: None,
        }
    }

    /// Mirror every append to durable storage.
    pub fn with_archive(mut self, archive: Arc<dyn LogArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Append an entry and return it with its sequence number.
    pub async fn append(&self, mut entry: LogEntry) -> LogEntry {
        {
            let mut entries = self.entries.write().await;
            entry.seq = self.seq.fetch_add(1, Ordering::SeqCst);
            entries.push(Arc::new(entry.clone()));
        }
        emit(&entry);
        self.archive(AuditRecord::Log(entry.clone())).await;
        entry
    }

    /// Shorthand for a task-scoped entry.
    pub async fn log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        task_id: Option<Uuid>,
        source: Option<&str>,
    ) -> LogEntry {
        let mut entry = LogEntry::new(level, message);
        entry.task_id = task_id;
        entry.source = source.map(str::to_string);
        self.append(entry).await
    }

    pub async fn record_thought(&self, mut thought: ChainOfThoughtEntry) -> ChainOfThoughtEntry {
        {
            let mut thoughts = self.thoughts.write().await;
            thought.seq = self.seq.fetch_add(1, Ordering::SeqCst);
            thoughts.push(Arc::new(thought.clone()));
        }
        debug!(
            task_id = %thought.task_id,
            seq = thought.seq,
            milestone = thought.milestone,
            "chain of thought"
        );
        self.archive(AuditRecord::Thought(thought.clone())).await;
        thought
    }

    async fn archive(&self, record: AuditRecord) {
        if let Some(archive) = &self.archive {
            if let Err(err) = archive.persist(&record).await {
                warn!(error = %err, "failed to archive audit record");
            }
        }
    }

    /// All entries in append order.
    pub async fn entries(&self) -> LogCursor<LogEntry> {
        LogCursor::new(self.entries.read().await.clone(), |_| true)
    }

    /// Entries for one task, in chronological order.
    pub async fn entries_for(&self, task_id: Uuid) -> LogCursor<LogEntry> {
        LogCursor::new(self.entries.read().await.clone(), move |e| {
            e.task_id == Some(task_id)
        })
    }

    pub async fn thoughts_for(&self, task_id: Uuid) -> LogCursor<ChainOfThoughtEntry> {
        LogCursor::new(self.thoughts.read().await.clone(), move |t| {
            t.task_id == task_id
        })
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn emit(entry: &LogEntry) {
    let task_id = entry.task_id.map(|id| id.to_string());
    let source = entry.source.as_deref().unwrap_or("");
    let task_id = task_id.as_deref().unwrap_or("");
    match entry.level {
        LogLevel::Debug => debug!(seq = entry.seq, task_id, source, "{}", entry.message),
        LogLevel::Info | LogLevel::Success => {
            info!(seq = entry.seq, level = %entry.level, task_id, source, "{}", entry.message);
        }
        LogLevel::Warning => warn!(seq = entry.seq, task_id, source, "{}", entry.message),
        LogLevel::Error => error!(seq = entry.seq, task_id, source, "{}", entry.message),
    }
}

/// Lazy iterator over a snapshot of the log taken when the query ran.
/// Later appends are not visible through it.
pub struct LogCursor<T> {
    items: std::vec::IntoIter<Arc<T>>,
    filter: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> LogCursor<T> {
    fn new(items: Vec<Arc<T>>, filter: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            items: items.into_iter(),
            filter: Box::new(filter),
        }
    }
}

impl<T: Clone> Iterator for LogCursor<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.items
            .by_ref()
            .find(|item| (self.filter)(item.as_ref()))
            .map(|item| (*item).clone())
    }
}
