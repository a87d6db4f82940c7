//! Substrate Handle - Shared Access Through One Task
//!
//! `TigerStyle`: One owner, commands run to completion in arrival order.
//!
//! [`SubstrateHandle::spawn`] moves a [`Substrate`] into a tokio task. The
//! handle is cheap to clone; every clone sends commands over the same
//! bounded channel and waits for the reply on a oneshot. The task stops when
//! every handle is dropped or on [`SubstrateHandle::shutdown`], which hands
//! the substrate back.

use tokio::sync::{mpsc, oneshot};

use super::{ConsolidationReport, EnrichedResult, MemoryStats, SearchOptions, StorageResult, Substrate};
use crate::constants::HANDLE_COMMAND_QUEUE_COUNT_MAX;
use crate::error::{MemoryError, MemoryResult};
use crate::memory::Metadata;

enum SubstrateCommand {
    Store {
        content: String,
        metadata: Metadata,
        reply_tx: oneshot::Sender<MemoryResult<StorageResult>>,
    },
    Search {
        query: String,
        options: SearchOptions,
        reply_tx: oneshot::Sender<MemoryResult<Vec<EnrichedResult>>>,
    },
    Consolidate {
        reply_tx: oneshot::Sender<MemoryResult<ConsolidationReport>>,
    },
    Stats {
        reply_tx: oneshot::Sender<MemoryStats>,
    },
    Shutdown {
        reply_tx: oneshot::Sender<Substrate>,
    },
}

/// Cloneable handle to a substrate owned by a background task.
#[derive(Debug, Clone)]
pub struct SubstrateHandle {
    command_tx: mpsc::Sender<SubstrateCommand>,
}

impl std::fmt::Debug for SubstrateCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Store { .. } => "Store",
            Self::Search { .. } => "Search",
            Self::Consolidate { .. } => "Consolidate",
            Self::Stats { .. } => "Stats",
            Self::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}

impl SubstrateHandle {
    /// Move `substrate` into a new task on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(substrate: Substrate) -> Self {
        let (command_tx, command_rx) = mpsc::channel(HANDLE_COMMAND_QUEUE_COUNT_MAX);
        tokio::spawn(substrate_task(substrate, command_rx));
        Self { command_tx }
    }

    /// See [`Substrate::store`].
    ///
    /// # Errors
    /// As for [`Substrate::store`], or `Shutdown` if the task has stopped.
    pub async fn store(&self, content: impl Into<String>, metadata: Metadata) -> MemoryResult<StorageResult> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SubstrateCommand::Store {
            content: content.into(),
            metadata,
            reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| MemoryError::Shutdown)?
    }

    /// See [`Substrate::search`].
    ///
    /// # Errors
    /// As for [`Substrate::search`], or `Shutdown` if the task has stopped.
    pub async fn search(
        &self,
        query: impl Into<String>,
        options: SearchOptions,
    ) -> MemoryResult<Vec<EnrichedResult>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SubstrateCommand::Search {
            query: query.into(),
            options,
            reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| MemoryError::Shutdown)?
    }

    /// See [`Substrate::consolidate`].
    ///
    /// # Errors
    /// As for [`Substrate::consolidate`], or `Shutdown` if the task has stopped.
    pub async fn consolidate(&self) -> MemoryResult<ConsolidationReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SubstrateCommand::Consolidate { reply_tx }).await?;
        reply_rx.await.map_err(|_| MemoryError::Shutdown)?
    }

    /// See [`Substrate::stats`].
    ///
    /// # Errors
    /// `Shutdown` if the task has stopped.
    pub async fn stats(&self) -> MemoryResult<MemoryStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SubstrateCommand::Stats { reply_tx }).await?;
        reply_rx.await.map_err(|_| MemoryError::Shutdown)
    }

    /// Stop the task after the commands already queued and return the substrate.
    ///
    /// Other clones of this handle get `Shutdown` from then on.
    ///
    /// # Errors
    /// `Shutdown` if the task had already stopped.
    pub async fn shutdown(&self) -> MemoryResult<Substrate> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SubstrateCommand::Shutdown { reply_tx }).await?;
        reply_rx.await.map_err(|_| MemoryError::Shutdown)
    }

    /// Whether the task has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    async fn send(&self, command: SubstrateCommand) -> MemoryResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| MemoryError::Shutdown)
    }
}

async fn substrate_task(mut substrate: Substrate, mut commands: mpsc::Receiver<SubstrateCommand>) {
    tracing::debug!("substrate task started");

    while let Some(cmd) = commands.recv().await {
        match cmd {
            SubstrateCommand::Store {
                content,
                metadata,
                reply_tx,
            } => {
                let result = substrate.store(&content, metadata).await;
                let _ = reply_tx.send(result);
            }
            SubstrateCommand::Search {
                query,
                options,
                reply_tx,
            } => {
                let result = substrate.search(&query, options).await;
                let _ = reply_tx.send(result);
            }
            SubstrateCommand::Consolidate { reply_tx } => {
                let result = substrate.consolidate().await;
                let _ = reply_tx.send(result);
            }
            SubstrateCommand::Stats { reply_tx } => {
                let _ = reply_tx.send(substrate.stats());
            }
            SubstrateCommand::Shutdown { reply_tx } => {
                commands.close();
                tracing::debug!("substrate task shut down");
                let _ = reply_tx.send(substrate);
                return;
            }
        }
    }

    tracing::debug!("all substrate handles dropped; task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::SubstrateConfig;

    fn small() -> Substrate {
        Substrate::sim_with_config(42, SubstrateConfig::default().with_dimensions(8).with_capacity(32))
            .unwrap()
    }

    #[tokio::test]
    async fn test_handle_round_trip() {
        let handle = SubstrateHandle::spawn(small());

        let stored = handle.store("hello world", Metadata::new()).await.unwrap();
        let results = handle
            .search("hello world", SearchOptions::new().with_k(1))
            .await
            .unwrap();
        let report = handle.consolidate().await.unwrap();
        let stats = handle.stats().await.unwrap();

        assert_eq!(results[0].id, stored.id);
        assert_eq!(report.backend.vector_count, 1);
        assert_eq!(stats.fast_cache.write_count, 1);
    }

    #[tokio::test]
    async fn test_handle_clones_share_one_substrate() {
        let handle = SubstrateHandle::spawn(small());

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.store(format!("note {i}"), Metadata::new()).await })
            })
            .collect();
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap().id);
        }
        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), 8);
        assert_eq!(handle.stats().await.unwrap().temporal_length, 8);
    }

    #[tokio::test]
    async fn test_shutdown_returns_substrate_and_closes() {
        let handle = SubstrateHandle::spawn(small());
        let other = handle.clone();
        handle.store("kept", Metadata::new()).await.unwrap();

        let substrate = handle.shutdown().await.unwrap();

        assert_eq!(substrate.fast_cache().len(), 1);
        assert_eq!(
            other.store("late", Metadata::new()).await.unwrap_err(),
            MemoryError::Shutdown
        );
        assert!(other.is_closed());
        assert_eq!(other.shutdown().await.unwrap_err(), MemoryError::Shutdown);
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let handle = SubstrateHandle::spawn(small());

        let err = handle.store("   ", Metadata::new()).await.unwrap_err();

        assert!(matches!(err, MemoryError::InvalidInput { .. }));
        assert!(!handle.is_closed());
    }
}
