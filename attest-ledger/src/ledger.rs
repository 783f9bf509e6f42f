//! Main ledger orchestration layer
//!
//! This module ties together storage, the chain and the writer actor into a
//! high-level API for attestation records.
//!
//! # Example
//!
//! ```no_run
//! use attest_ledger::{Config, Ledger, Record};
//!
//! #[tokio::main]
//! async fn main() -> attest_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let hash = attest_ledger::crypto::content_hash(b"lecture notes");
//!     ledger.submit(Record::knowledge_certification(1, 7, hash.clone())).await?;
//!     ledger.seal().await?;
//!
//!     assert!(ledger.verify(1, &hash));
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle, LedgerTasks},
    certificate::{
        Certificate, CertificateIndex, CertificateIssuer, CertificateOutcome,
        CertificateVerification,
    },
    chain::Chain,
    metrics::Metrics,
    storage::{BlockStore, Storage},
    types::{
        Block, ChainStats, ChainSummary, Record, RecordKind, RecordLocation, Verification,
    },
    Config, Error, Result,
};
use parking_lot::RwLock;
use std::sync::Arc;

/// Main ledger interface
pub struct Ledger {
    /// Actor handle for mutations
    handle: LedgerHandle,

    /// Writer and persister tasks
    tasks: LedgerTasks,

    /// Shared chain (for reads)
    chain: Arc<RwLock<Chain>>,

    /// Store (for certificates; blocks go through the persister)
    store: Arc<dyn BlockStore>,

    /// Certificate builder
    certificates: CertificateIssuer,

    /// Issued certificates
    issued: RwLock<CertificateIndex>,

    /// Metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("data_dir", &self.config.data_dir)
            .field("chain_length", &self.chain.read().len())
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Open ledger backed by RocksDB at `config.data_dir`
    pub async fn open(config: Config) -> Result<Self> {
        config.check()?;
        let storage = {
            let config = config.clone();
            run_blocking(move || Storage::open(&config)).await?
        };
        Self::with_store(config, Arc::new(storage)).await
    }

    /// Open ledger on any block store
    pub async fn with_store(config: Config, store: Arc<dyn BlockStore>) -> Result<Self> {
        config.check()?;

        let (blocks, certificates) = {
            let store = store.clone();
            run_blocking(move || Ok((store.load_all()?, store.load_certificates()?))).await?
        };
        let was_empty = blocks.is_empty();
        let chain = Chain::from_blocks(blocks);

        if was_empty {
            // Reloaded chains must start at height 0
            let store = store.clone();
            let genesis = chain.latest_block().clone();
            if let Err(e) = run_blocking(move || store.save(&genesis)).await {
                tracing::error!(error = %e, "Failed to persist genesis block");
            }
        }

        if let Err(e) = chain.validate() {
            tracing::warn!(error = %e, "Loaded chain failed validation");
        }

        let metrics = Metrics::new()?;
        metrics.chain_length.set(chain.len() as i64);

        tracing::info!(
            service = %config.service_name,
            blocks = chain.len(),
            certificates = certificates.len(),
            latest_hash = %chain.latest_block().hash,
            "Ledger opened"
        );

        let chain = Arc::new(RwLock::new(chain));
        let (handle, tasks) =
            spawn_ledger_actor(chain.clone(), store.clone(), config.sealing.clone(), metrics.clone());

        Ok(Self {
            handle,
            tasks,
            chain,
            store,
            certificates: CertificateIssuer::new(config.certificate.base_url.clone()),
            issued: RwLock::new(CertificateIndex::from_certificates(certificates)),
            metrics,
            config,
        })
    }

    /// Submit a record for the next block.
    ///
    /// Returns the projected sealing height.
    pub async fn submit(&self, record: Record) -> Result<u64> {
        if self.config.validation.require_hex_content_hash && !record.has_well_formed_content_hash()
        {
            self.metrics.record_rejected();
            return Err(Error::InvalidRecord(
                "content hash must be 64 lowercase hex characters".to_string(),
            ));
        }

        self.handle.submit(record).await
    }

    /// Seal pending records now
    pub async fn seal(&self) -> Result<Option<Block>> {
        self.handle.seal().await
    }

    /// Whether the chain passes the integrity walk
    pub fn is_valid(&self) -> bool {
        self.chain.read().is_valid()
    }

    /// First integrity violation, if any
    pub fn validate(&self) -> Result<()> {
        self.chain.read().validate()
    }

    /// Oldest knowledge certification of `subject_id`
    pub fn find_by_subject(&self, subject_id: i64) -> Option<Record> {
        self.chain.read().find_by_subject(subject_id).cloned()
    }

    /// Oldest knowledge certification of `subject_id` with its location
    pub fn locate_by_subject(&self, subject_id: i64) -> Option<RecordLocation> {
        self.chain.read().locate_by_subject(subject_id)
    }

    /// Records by `actor_id`, optionally of one kind
    pub fn find_by_actor(&self, actor_id: i64, kind: Option<RecordKind>) -> Vec<Record> {
        self.chain
            .read()
            .find_by_actor(actor_id, kind)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Whether `content_hash` matches the recorded certification
    pub fn verify(&self, subject_id: i64, content_hash: &str) -> bool {
        self.chain.read().verify(subject_id, content_hash)
    }

    /// Verification with location and outcome
    pub fn verify_detailed(&self, subject_id: i64, content_hash: &str) -> Verification {
        self.chain.read().verify_detailed(subject_id, content_hash)
    }

    /// Block at `height`
    pub fn block_at(&self, height: u64) -> Option<Block> {
        self.chain.read().block_at(height).cloned()
    }

    /// Newest block
    pub fn latest_block(&self) -> Block {
        self.chain.read().latest_block().clone()
    }

    /// Every record, sealed then pending
    pub fn all_records(&self) -> Vec<Record> {
        self.chain.read().records().cloned().collect()
    }

    /// Chain summary
    pub fn summary(&self) -> ChainSummary {
        self.chain.read().summary()
    }

    /// Record counts
    pub fn stats(&self) -> ChainStats {
        self.chain.read().stats()
    }

    /// Issue and store a certificate for the sealed certification of `subject_id`.
    ///
    /// Unlike block saves, a failed certificate save is returned to the caller
    /// and the certificate is not indexed.
    pub async fn issue_certificate(
        &self,
        subject_id: i64,
        subject_title: impl Into<String>,
        actor_name: impl Into<String>,
    ) -> Result<Certificate> {
        let location = self.locate_by_subject(subject_id).ok_or_else(|| {
            Error::NotFound(format!("no certification for subject {}", subject_id))
        })?;

        let mut certificate = self
            .certificates
            .issue(&location, subject_title, actor_name)?;

        // Ids come from a million-wide space; draw again on collision
        let mut attempts = 1;
        while self.issued.read().contains(&certificate.certificate_id) {
            if attempts >= MAX_CERTIFICATE_ID_ATTEMPTS {
                return Err(Error::Other(
                    "could not allocate a free certificate id".to_string(),
                ));
            }
            certificate.certificate_id = self
                .certificates
                .certificate_id(subject_id, certificate.block_height);
            certificate.verification_url =
                self.certificates.verification_url(&certificate.certificate_id);
            attempts += 1;
        }

        {
            let store = self.store.clone();
            let certificate = certificate.clone();
            run_blocking(move || store.save_certificate(&certificate)).await?;
        }

        self.issued.write().insert(certificate.clone());
        self.metrics.record_certificate_issued();

        tracing::info!(
            certificate_id = %certificate.certificate_id,
            subject_id,
            height = certificate.block_height,
            "Certificate issued"
        );

        Ok(certificate)
    }

    /// Issued certificate by id
    pub fn certificate(&self, certificate_id: &str) -> Option<Certificate> {
        self.issued.read().get(certificate_id).cloned()
    }

    /// Most recently issued certificate for `subject_id`
    pub fn certificate_for_subject(&self, subject_id: i64) -> Option<Certificate> {
        self.issued.read().for_subject(subject_id).cloned()
    }

    /// Check an issued certificate against the current chain
    pub fn verify_certificate(&self, certificate_id: &str) -> CertificateVerification {
        let outcome = match self.certificate(certificate_id) {
            Some(certificate) => certificate.check(&self.chain.read()),
            None => CertificateOutcome::NotFound,
        };

        CertificateVerification::new(certificate_id, outcome)
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop the writer and wait for queued blocks to be saved
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await?;
        self.tasks.join().await?;

        tracing::info!(blocks = self.chain.read().len(), "Ledger shut down");
        Ok(())
    }
}

const MAX_CERTIFICATE_ID_ATTEMPTS: usize = 8;

/// Run store I/O on the blocking pool
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Concurrency(format!("Blocking task failed: {}", e)))?
}
