//! Persistence gateway
//!
//! The ledger loads every block once at startup and saves each newly sealed
//! block; issued certificates are kept alongside. [`BlockStore`] captures
//! that contract; [`Storage`] implements it on RocksDB and [`MemoryStore`]
//! keeps everything in process.
//!
//! # Column Families
//!
//! - `blocks` - Sealed blocks (key: big-endian height, value: JSON block)
//! - `certificates` - Issued certificates (key: certificate id, value: JSON certificate)

use crate::{
    certificate::Certificate,
    error::{Error, Result},
    types::Block,
    Config,
};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, IteratorMode, Options, DB};

/// Column family names
const CF_BLOCKS: &str = "blocks";
const CF_CERTIFICATES: &str = "certificates";

/// Durable load/save of sealed blocks
pub trait BlockStore: Send + Sync {
    /// All stored blocks in ascending height
    fn load_all(&self) -> Result<Vec<Block>>;

    /// Store a newly sealed block; a height is written at most once
    fn save(&self, block: &Block) -> Result<()>;

    /// All issued certificates
    fn load_certificates(&self) -> Result<Vec<Certificate>>;

    /// Store an issued certificate; an id is written at most once
    fn save_certificate(&self, certificate: &Certificate) -> Result<()>;
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Append-only workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_BLOCKS, Self::cf_options_blocks()),
            ColumnFamilyDescriptor::new(CF_CERTIFICATES, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), "Opened RocksDB block store");

        Ok(Self { db })
    }

    fn cf_options_blocks() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Persistence(format!("Column family {} not found", name)))
    }

    /// Get block by height
    pub fn get_block(&self, height: u64) -> Result<Block> {
        let cf = self.cf_handle(CF_BLOCKS)?;

        let value = self
            .db
            .get_cf(cf, height.to_be_bytes())?
            .ok_or(Error::BlockNotFound(height))?;

        Ok(serde_json::from_slice(&value)?)
    }

    /// Get latest block
    pub fn latest_block(&self) -> Result<Option<Block>> {
        let cf = self.cf_handle(CF_BLOCKS)?;

        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (_, value) = item?;
                Ok(Some(serde_json::from_slice(&value)?))
            }
            None => Ok(None),
        }
    }

    /// Number of stored blocks
    pub fn block_count(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_BLOCKS)?;
        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

impl BlockStore for Storage {
    fn load_all(&self) -> Result<Vec<Block>> {
        let cf = self.cf_handle(CF_BLOCKS)?;

        let mut blocks = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            blocks.push(serde_json::from_slice::<Block>(&value)?);
        }

        tracing::debug!(blocks = blocks.len(), "Loaded blocks from RocksDB");

        Ok(blocks)
    }

    fn save(&self, block: &Block) -> Result<()> {
        let cf = self.cf_handle(CF_BLOCKS)?;
        let key = block.height.to_be_bytes();

        if self.db.get_pinned_cf(cf, key)?.is_some() {
            return Err(Error::Persistence(format!(
                "block at height {} already stored",
                block.height
            )));
        }

        let value = serde_json::to_vec(block)?;
        self.db.put_cf(cf, key, value)?;

        tracing::debug!(
            height = block.height,
            records = block.record_count(),
            "Block persisted"
        );

        Ok(())
    }

    fn load_certificates(&self) -> Result<Vec<Certificate>> {
        let cf = self.cf_handle(CF_CERTIFICATES)?;

        let mut certificates = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            certificates.push(serde_json::from_slice::<Certificate>(&value)?);
        }

        Ok(certificates)
    }

    fn save_certificate(&self, certificate: &Certificate) -> Result<()> {
        let cf = self.cf_handle(CF_CERTIFICATES)?;
        let key = certificate.certificate_id.as_bytes();

        if self.db.get_pinned_cf(cf, key)?.is_some() {
            return Err(Error::Persistence(format!(
                "certificate {} already stored",
                certificate.certificate_id
            )));
        }

        self.db.put_cf(cf, key, serde_json::to_vec(certificate)?)?;

        tracing::debug!(certificate_id = %certificate.certificate_id, "Certificate persisted");

        Ok(())
    }
}

/// In-process block store
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: Mutex<Vec<Block>>,
    certificates: Mutex<Vec<Certificate>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `blocks`
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Mutex::new(blocks),
            certificates: Mutex::new(Vec::new()),
        }
    }

    /// Number of stored blocks
    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.blocks.lock().is_empty()
    }
}

impl BlockStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<Block>> {
        let mut blocks = self.blocks.lock().clone();
        blocks.sort_by_key(|b| b.height);
        Ok(blocks)
    }

    fn save(&self, block: &Block) -> Result<()> {
        let mut blocks = self.blocks.lock();
        if blocks.iter().any(|b| b.height == block.height) {
            return Err(Error::Persistence(format!(
                "block at height {} already stored",
                block.height
            )));
        }
        blocks.push(block.clone());
        Ok(())
    }

    fn load_certificates(&self) -> Result<Vec<Certificate>> {
        Ok(self.certificates.lock().clone())
    }

    fn save_certificate(&self, certificate: &Certificate) -> Result<()> {
        let mut certificates = self.certificates.lock();
        if certificates
            .iter()
            .any(|c| c.certificate_id == certificate.certificate_id)
        {
            return Err(Error::Persistence(format!(
                "certificate {} already stored",
                certificate.certificate_id
            )));
        }
        certificates.push(certificate.clone());
        Ok(())
    }
}
