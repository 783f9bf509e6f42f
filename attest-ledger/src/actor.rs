//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One writer task owns every mutation of the chain
//! - Readers share the chain through a read lock and never see a half-applied seal
//! - Sealed blocks are queued to a persister task, off the writer's path
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │ chain.write(): submit / seal                   │  │
//! │  │ Timer: seal_interval or max_pending → seal()   │  │
//! │  └────────────────────────────────────────────────┘  │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::unbounded_channel (ordered)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              Persister (Single Task)                  │
//! │        BlockStore::save() on the blocking pool        │
//! │        failures logged, never rolled back             │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::chain::Chain;
use crate::config::SealingConfig;
use crate::metrics::Metrics;
use crate::storage::BlockStore;
use crate::types::{Block, Record};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Validate and buffer a record
    Submit {
        /// Record to buffer
        record: Record,
        /// Projected height or rejection
        response: oneshot::Sender<Result<u64>>,
    },

    /// Seal the pending buffer
    Seal {
        /// Sealed block, if anything was pending
        response: oneshot::Sender<Option<Block>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns all chain mutations
#[derive(Debug)]
pub struct LedgerActor {
    /// Shared chain; written only here
    chain: Arc<RwLock<Chain>>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Queue of sealed blocks awaiting persistence
    persist_queue: mpsc::UnboundedSender<Block>,

    /// Sealing triggers
    sealing: SealingConfig,

    /// Metrics
    metrics: Metrics,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        chain: Arc<RwLock<Chain>>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        persist_queue: mpsc::UnboundedSender<Block>,
        sealing: SealingConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            chain,
            mailbox,
            persist_queue,
            sealing,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let period = Duration::from_millis(self.sealing.seal_interval_ms.max(1));
        let mut seal_timer = interval_at(Instant::now() + period, period);
        seal_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let has_pending = !self.chain.read().pending().is_empty();

            tokio::select! {
                // Process incoming messages
                Some(msg) = self.mailbox.recv() => {
                    match msg {
                        LedgerMessage::Shutdown => {
                            if self.sealing.seal_on_shutdown {
                                self.seal();
                            }
                            break;
                        }
                        msg => {
                            self.handle_message(msg);

                            // First record of a batch waits a full interval
                            if !has_pending && !self.chain.read().pending().is_empty() {
                                seal_timer.reset();
                            }
                        }
                    }
                }

                // Seal interval expired with records waiting
                _ = seal_timer.tick(), if self.sealing.auto_seal && has_pending => {
                    self.seal();
                }

                // Mailbox closed
                else => {
                    if self.sealing.seal_on_shutdown {
                        self.seal();
                    }
                    break;
                }
            }
        }

        tracing::info!("Ledger writer stopped");
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Submit { record, response } => {
                let result = {
                    let mut chain = self.chain.write();
                    chain.submit(record).map(|height| (height, chain.pending().len()))
                };

                match result {
                    Ok((height, pending)) => {
                        self.metrics.record_submitted(pending);
                        tracing::debug!(height, pending, "Record buffered");

                        let threshold = self.sealing.max_pending_records;
                        if self.sealing.seal_on_submit || (threshold > 0 && pending >= threshold) {
                            self.seal();
                        }

                        let _ = response.send(Ok(height));
                    }
                    Err(e) => {
                        self.metrics.record_rejected();
                        tracing::debug!(error = %e, "Record rejected");
                        let _ = response.send(Err(e));
                    }
                }
            }

            LedgerMessage::Seal { response } => {
                let _ = response.send(self.seal());
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    /// Seal pending records and queue the block for persistence
    fn seal(&mut self) -> Option<Block> {
        let (block, chain_length) = {
            let mut chain = self.chain.write();
            let block = chain.seal()?;
            (block, chain.len())
        };

        self.metrics
            .record_block_sealed(block.record_count(), chain_length);

        tracing::info!(
            height = block.height,
            records = block.record_count(),
            hash = %block.hash,
            "Block sealed"
        );

        if self.persist_queue.send(block.clone()).is_err() {
            tracing::warn!(
                height = block.height,
                "Persister stopped; block kept in memory only"
            );
        }

        Some(block)
    }
}

/// Save queued blocks in order until the queue closes
pub async fn run_persister(
    store: Arc<dyn BlockStore>,
    mut queue: mpsc::UnboundedReceiver<Block>,
    metrics: Metrics,
) {
    while let Some(block) = queue.recv().await {
        let height = block.height;
        let store = store.clone();

        match tokio::task::spawn_blocking(move || store.save(&block)).await {
            Ok(Ok(())) => {
                tracing::debug!(height, "Block saved");
            }
            Ok(Err(e)) => {
                metrics.record_persistence_failure();
                tracing::error!(height, error = %e, "Failed to persist block");
            }
            Err(e) => {
                metrics.record_persistence_failure();
                tracing::error!(height, error = %e, "Persistence task failed");
            }
        }
    }

    tracing::debug!("Persister stopped");
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Submit a record
    pub async fn submit(&self, record: Record) -> Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Submit {
                record,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Seal the pending buffer
    pub async fn seal(&self) -> Result<Option<Block>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Seal { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Background tasks backing a [`LedgerHandle`]
#[derive(Debug)]
pub struct LedgerTasks {
    writer: JoinHandle<()>,
    persister: JoinHandle<()>,
}

impl LedgerTasks {
    /// Wait for the writer to stop and the persister to drain its queue
    pub async fn join(self) -> Result<()> {
        self.writer
            .await
            .map_err(|e| Error::Concurrency(format!("Writer task failed: {}", e)))?;
        self.persister
            .await
            .map_err(|e| Error::Concurrency(format!("Persister task failed: {}", e)))?;
        Ok(())
    }
}

/// Spawn the ledger actor and its persister
pub fn spawn_ledger_actor(
    chain: Arc<RwLock<Chain>>,
    store: Arc<dyn BlockStore>,
    sealing: SealingConfig,
    metrics: Metrics,
) -> (LedgerHandle, LedgerTasks) {
    let (tx, rx) = mpsc::channel(sealing.mailbox_capacity.max(1)); // Bounded channel for backpressure
    let (persist_tx, persist_rx) = mpsc::unbounded_channel();

    let persister = tokio::spawn(run_persister(store, persist_rx, metrics.clone()));

    let actor = LedgerActor::new(chain, rx, persist_tx, sealing, metrics);
    let writer = tokio::spawn(async move {
        actor.run().await;
    });

    (LedgerHandle::new(tx), LedgerTasks { writer, persister })
}
