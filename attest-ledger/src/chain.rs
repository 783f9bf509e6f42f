//! In-memory hash chain
//!
//! [`Chain`] holds the sealed blocks plus the buffer of pending records and
//! implements append, integrity validation and lookup. It is a plain value
//! with no interior locking; [`crate::Ledger`] puts it behind the single
//! writer actor and a read/write lock.
//!
//! # Invariants
//!
//! - `blocks[0]` is genesis: height 0, zero previous hash, no records
//! - `blocks[i].previous_hash == blocks[i - 1].hash`
//! - `blocks[i].hash == blocks[i].recompute_hash()`
//! - Sealing consumes the whole pending buffer or nothing

use crate::{
    crypto,
    types::{
        Block, ChainStats, ChainSummary, Record, RecordKind, RecordLocation, RecordStatus,
        Verification, VerificationOutcome,
    },
    Error, Result,
};
use std::collections::BTreeMap;

/// Ordered blocks plus pending records
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    pending: Vec<Record>,
}

impl Chain {
    /// Create a chain holding only the genesis block
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
            pending: Vec::new(),
        }
    }

    /// Rebuild from persisted blocks (ascending height).
    ///
    /// An empty sequence yields a fresh genesis chain. Loaded blocks are
    /// taken as-is; use [`Chain::validate`] to check them.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        if blocks.is_empty() {
            return Self::new();
        }
        Self {
            blocks,
            pending: Vec::new(),
        }
    }

    /// Buffer a validated record.
    ///
    /// Returns the height the record is projected to be sealed at. The
    /// projection is advisory: a seal triggered elsewhere may move it.
    pub fn submit(&mut self, record: Record) -> Result<u64> {
        if !record.validate() {
            return Err(Error::InvalidRecord(format!(
                "{} record is missing required fields",
                record.kind
            )));
        }

        self.pending.push(record);
        Ok(self.blocks.len() as u64)
    }

    /// Seal all pending records into a new block.
    ///
    /// Returns `None` without touching state when nothing is pending.
    pub fn seal(&mut self) -> Option<Block> {
        if self.pending.is_empty() {
            return None;
        }

        let height = self.blocks.len() as u64;
        let previous_hash = self.latest_block().hash.clone();
        let records = std::mem::take(&mut self.pending);

        let block = Block::seal(height, records, previous_hash);
        self.blocks.push(block.clone());

        Some(block)
    }

    /// Walk the chain and report the first integrity violation
    pub fn validate(&self) -> Result<()> {
        let genesis = self
            .blocks
            .first()
            .ok_or_else(|| corrupted(0, "chain has no genesis block"))?;

        if !genesis.is_genesis() {
            return Err(corrupted(
                0,
                "genesis must have height 0, zero previous hash and no records",
            ));
        }

        if genesis.hash != genesis.recompute_hash() {
            return Err(corrupted(0, "stored hash does not match block contents"));
        }

        for (i, pair) in self.blocks.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let height = (i + 1) as u64;

            if current.height != height {
                return Err(corrupted(
                    height,
                    format!("block claims height {}", current.height),
                ));
            }

            if current.hash != current.recompute_hash() {
                return Err(corrupted(height, "stored hash does not match block contents"));
            }

            if current.previous_hash != previous.hash {
                return Err(corrupted(height, "previous hash does not link to predecessor"));
            }

            if !crypto::is_hex_digest(&current.previous_hash) {
                return Err(corrupted(height, "previous hash is not a 64 character hex digest"));
            }
        }

        Ok(())
    }

    /// Whether both integrity invariants hold for the whole chain
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// First knowledge certification of `subject_id`, oldest first
    pub fn find_by_subject(&self, subject_id: i64) -> Option<&Record> {
        self.records().find(|r| r.certifies(subject_id))
    }

    /// First knowledge certification of `subject_id` with its location
    pub fn locate_by_subject(&self, subject_id: i64) -> Option<RecordLocation> {
        for block in &self.blocks {
            if let Some(record) = block.records.iter().find(|r| r.certifies(subject_id)) {
                return Some(RecordLocation {
                    record: record.clone(),
                    status: RecordStatus::Sealed {
                        height: block.height,
                        block_hash: block.hash.clone(),
                    },
                });
            }
        }

        self.pending
            .iter()
            .find(|r| r.certifies(subject_id))
            .map(|record| RecordLocation {
                record: record.clone(),
                status: RecordStatus::Pending,
            })
    }

    /// All records by `actor_id`, optionally of one kind, in chain order
    pub fn find_by_actor(&self, actor_id: i64, kind: Option<RecordKind>) -> Vec<&Record> {
        self.records()
            .filter(|r| r.actor_id == Some(actor_id))
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .collect()
    }

    /// Whether the recorded certification of `subject_id` has exactly `content_hash`
    pub fn verify(&self, subject_id: i64, content_hash: &str) -> bool {
        self.find_by_subject(subject_id)
            .map_or(false, |r| r.content_hash.as_deref() == Some(content_hash))
    }

    /// Verification with location and timestamp of the matched record
    pub fn verify_detailed(&self, subject_id: i64, content_hash: &str) -> Verification {
        match self.locate_by_subject(subject_id) {
            Some(location) => {
                let is_valid = location.record.content_hash.as_deref() == Some(content_hash);
                Verification {
                    is_valid,
                    outcome: if is_valid {
                        VerificationOutcome::Verified
                    } else {
                        VerificationOutcome::HashMismatch
                    },
                    recorded_at: Some(location.record.created_at),
                    status: Some(location.status),
                }
            }
            None => Verification {
                is_valid: false,
                outcome: VerificationOutcome::NotFound,
                status: None,
                recorded_at: None,
            },
        }
    }

    /// Block at `height`, if any
    pub fn block_at(&self, height: u64) -> Option<&Block> {
        usize::try_from(height).ok().and_then(|i| self.blocks.get(i))
    }

    /// Newest block
    pub fn latest_block(&self) -> &Block {
        // `blocks` always holds at least genesis
        &self.blocks[self.blocks.len() - 1]
    }

    /// Sealed records in chain order, then pending records
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.blocks
            .iter()
            .flat_map(|b| b.records.iter())
            .chain(self.pending.iter())
    }

    /// Aggregate state; `is_valid` costs a full chain walk
    pub fn summary(&self) -> ChainSummary {
        let latest = self.latest_block();
        ChainSummary {
            chain_length: self.blocks.len(),
            pending_count: self.pending.len(),
            is_valid: self.is_valid(),
            latest_height: latest.height,
            latest_hash: latest.hash.clone(),
        }
    }

    /// Record counts per kind
    pub fn stats(&self) -> ChainStats {
        let mut records_by_kind = BTreeMap::new();
        let mut total_records = 0;
        for record in self.records() {
            *records_by_kind.entry(record.kind).or_insert(0) += 1;
            total_records += 1;
        }

        ChainStats {
            total_blocks: self.blocks.len(),
            total_records,
            pending_records: self.pending.len(),
            records_by_kind,
            is_valid: self.is_valid(),
        }
    }

    /// Sealed blocks, genesis first
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Pending records in submission order
    pub fn pending(&self) -> &[Record] {
        &self.pending
    }

    /// Number of blocks including genesis
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a chain holds at least genesis
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

fn corrupted(height: u64, reason: impl Into<String>) -> Error {
    Error::ChainCorrupted {
        height,
        reason: reason.into(),
    }
}
