//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic hashing (see [`crate::canonical`])
//! - Tolerant deserialization (unknown fields ignored, legacy names accepted)
//! - Immutability once sealed

use crate::{canonical, crypto};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form record metadata
pub type Metadata = BTreeMap<String, Value>;

/// Previous hash carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Current time as an ISO-8601 (RFC 3339, microsecond, UTC) string
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Kind of attested fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    /// Knowledge content certification
    #[serde(alias = "KNOWLEDGE_CERT")]
    KnowledgeCertification,
    /// User achievement
    Achievement,
    /// Copyright claim
    Copyright,
    /// User action log entry
    UserAction,
}

impl RecordKind {
    /// Canonical wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::KnowledgeCertification => "KNOWLEDGE_CERTIFICATION",
            RecordKind::Achievement => "ACHIEVEMENT",
            RecordKind::Copyright => "COPYRIGHT",
            RecordKind::UserAction => "USER_ACTION",
        }
    }

    /// Parse from string; `KNOWLEDGE_CERT` is an alias of `KNOWLEDGE_CERTIFICATION`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "KNOWLEDGE_CERTIFICATION" | "KNOWLEDGE_CERT" => Some(RecordKind::KnowledgeCertification),
            "ACHIEVEMENT" => Some(RecordKind::Achievement),
            "COPYRIGHT" => Some(RecordKind::Copyright),
            "USER_ACTION" => Some(RecordKind::UserAction),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attested fact submitted for inclusion in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordRepr", into = "RecordRepr")]
pub struct Record {
    /// Kind of fact
    pub kind: RecordKind,

    /// Attested subject (e.g. knowledge content id)
    pub subject_id: Option<i64>,

    /// Acting user
    pub actor_id: Option<i64>,

    /// SHA-256 hex digest of the attested content
    pub content_hash: Option<String>,

    /// Additional metadata
    pub metadata: Metadata,

    /// ISO-8601 creation timestamp
    pub created_at: String,

    /// Reserved for authenticity binding; never validated
    pub signature: Option<String>,

    /// Reserved for authenticity binding; never validated
    pub public_key: Option<String>,
}

impl Record {
    /// Create a record of `kind` stamped with the current time
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            subject_id: None,
            actor_id: None,
            content_hash: None,
            metadata: Metadata::new(),
            created_at: now_timestamp(),
            signature: None,
            public_key: None,
        }
    }

    /// Knowledge certification for `subject_id` by `actor_id`
    pub fn knowledge_certification(
        subject_id: i64,
        actor_id: i64,
        content_hash: impl Into<String>,
    ) -> Self {
        Self::new(RecordKind::KnowledgeCertification)
            .with_subject(subject_id)
            .with_actor(actor_id)
            .with_content_hash(content_hash)
    }

    /// Set subject
    pub fn with_subject(mut self, subject_id: i64) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    /// Set actor
    pub fn with_actor(mut self, actor_id: i64) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Set content hash
    pub fn with_content_hash(mut self, content_hash: impl Into<String>) -> Self {
        self.content_hash = Some(content_hash.into());
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Override the creation timestamp
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = created_at.into();
        self
    }

    /// Attach signature placeholders
    pub fn with_signature(mut self, signature: impl Into<String>, public_key: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self.public_key = Some(public_key.into());
        self
    }

    /// Check the kind-specific required fields
    pub fn validate(&self) -> bool {
        match self.kind {
            RecordKind::KnowledgeCertification => {
                self.subject_id.is_some() && self.actor_id.is_some() && self.content_hash.is_some()
            }
            RecordKind::Copyright => self.subject_id.is_some() && self.actor_id.is_some(),
            RecordKind::Achievement => self.actor_id.is_some() && self.content_hash.is_some(),
            RecordKind::UserAction => true,
        }
    }

    /// Whether the content hash, if present, is 64 lowercase hex characters
    pub fn has_well_formed_content_hash(&self) -> bool {
        self.content_hash
            .as_deref()
            .map_or(true, crypto::is_sha256_hex)
    }

    /// Derived identifier: first 16 hex chars of SHA-256 over
    /// `kind|subject_id|actor_id|created_at`.
    ///
    /// Not unique when two records share kind, ids and timestamp.
    pub fn record_id(&self) -> String {
        let data = format!(
            "{}|{}|{}|{}",
            self.kind.as_str(),
            display_opt(self.subject_id),
            display_opt(self.actor_id),
            self.created_at
        );
        let mut id = crypto::sha256_hex(data.as_bytes());
        id.truncate(16);
        id
    }

    /// Canonical object used as block hash input
    pub fn canonical_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), Value::String(self.record_id()));
        map.insert("kind".into(), Value::String(self.kind.as_str().into()));
        map.insert("subject_id".into(), opt_int(self.subject_id));
        map.insert("actor_id".into(), opt_int(self.actor_id));
        map.insert("content_hash".into(), opt_str(&self.content_hash));
        map.insert(
            "metadata".into(),
            Value::Object(self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        );
        map.insert("created_at".into(), Value::String(self.created_at.clone()));
        map.insert("signature".into(), opt_str(&self.signature));
        map.insert("public_key".into(), opt_str(&self.public_key));
        Value::Object(map)
    }

    /// Whether this is a knowledge certification of `subject_id`
    pub(crate) fn certifies(&self, subject_id: i64) -> bool {
        self.kind == RecordKind::KnowledgeCertification && self.subject_id == Some(subject_id)
    }
}

fn display_opt(value: Option<i64>) -> String {
    value.map_or_else(|| "null".to_string(), |v| v.to_string())
}

fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::from)
}

fn opt_str(value: &Option<String>) -> Value {
    value.as_ref().map_or(Value::Null, |s| Value::String(s.clone()))
}

/// Wire form of [`Record`]
#[derive(Serialize, Deserialize)]
struct RecordRepr {
    #[serde(default, skip_deserializing)]
    id: String,
    #[serde(alias = "type")]
    kind: RecordKind,
    #[serde(default, alias = "knowledge_id")]
    subject_id: Option<i64>,
    #[serde(default, alias = "user_id")]
    actor_id: Option<i64>,
    #[serde(default)]
    content_hash: Option<String>,
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default, alias = "timestamp")]
    created_at: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    public_key: Option<String>,
}

impl From<RecordRepr> for Record {
    fn from(repr: RecordRepr) -> Self {
        Self {
            kind: repr.kind,
            subject_id: repr.subject_id,
            actor_id: repr.actor_id,
            content_hash: repr.content_hash,
            metadata: repr.metadata.unwrap_or_default(),
            created_at: repr.created_at.unwrap_or_else(now_timestamp),
            signature: repr.signature,
            public_key: repr.public_key,
        }
    }
}

impl From<Record> for RecordRepr {
    fn from(record: Record) -> Self {
        Self {
            id: record.record_id(),
            kind: record.kind,
            subject_id: record.subject_id,
            actor_id: record.actor_id,
            content_hash: record.content_hash,
            metadata: Some(record.metadata),
            created_at: Some(record.created_at),
            signature: record.signature,
            public_key: record.public_key,
        }
    }
}

/// Immutable, hash-linked batch of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (genesis is 0)
    #[serde(alias = "index")]
    pub height: u64,

    /// ISO-8601 sealing timestamp
    #[serde(alias = "timestamp")]
    pub created_at: String,

    /// Records in submission order
    #[serde(default, alias = "transactions")]
    pub records: Vec<Record>,

    /// Hash of the preceding block
    pub previous_hash: String,

    /// Hash of this block, computed at sealing
    pub hash: String,
}

impl Block {
    /// Seal `records` into a block at `height` linked to `previous_hash`.
    ///
    /// Records are not re-validated here.
    pub fn seal(height: u64, records: Vec<Record>, previous_hash: impl Into<String>) -> Self {
        let previous_hash = previous_hash.into();
        debug_assert!(
            crypto::is_hex_digest(&previous_hash),
            "previous_hash must be 64 hex characters"
        );

        let mut block = Self {
            height,
            created_at: now_timestamp(),
            records,
            previous_hash,
            hash: String::new(),
        };
        block.hash = block.recompute_hash();
        block
    }

    /// The genesis block
    pub fn genesis() -> Self {
        Self::seal(0, Vec::new(), GENESIS_PREVIOUS_HASH)
    }

    /// Whether this block has the genesis shape
    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH && self.records.is_empty()
    }

    /// Number of records
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Recompute the block hash from its fields (stored `hash` excluded)
    pub fn recompute_hash(&self) -> String {
        canonical::hash(&self.canonical_value())
    }

    fn canonical_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("height".into(), Value::from(self.height));
        map.insert("created_at".into(), Value::String(self.created_at.clone()));
        map.insert(
            "records".into(),
            Value::Array(self.records.iter().map(Record::canonical_value).collect()),
        );
        map.insert("previous_hash".into(), Value::String(self.previous_hash.clone()));
        Value::Object(map)
    }
}

/// Aggregate view of the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSummary {
    /// Number of blocks including genesis
    pub chain_length: usize,
    /// Records waiting to be sealed
    pub pending_count: usize,
    /// Result of the full integrity walk
    pub is_valid: bool,
    /// Height of the newest block
    pub latest_height: u64,
    /// Hash of the newest block
    pub latest_hash: String,
}

/// Record counts across the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStats {
    /// Number of blocks including genesis
    pub total_blocks: usize,
    /// Sealed plus pending records
    pub total_records: usize,
    /// Records waiting to be sealed
    pub pending_records: usize,
    /// Sealed plus pending records per kind
    pub records_by_kind: BTreeMap<RecordKind, usize>,
    /// Result of the full integrity walk
    pub is_valid: bool,
}

/// Where a record currently lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    /// Still in the pending buffer
    Pending,
    /// Sealed into a block
    Sealed {
        /// Block height
        height: u64,
        /// Block hash
        block_hash: String,
    },
}

impl RecordStatus {
    /// Sealing height, if sealed
    pub fn height(&self) -> Option<u64> {
        match self {
            RecordStatus::Pending => None,
            RecordStatus::Sealed { height, .. } => Some(*height),
        }
    }
}

/// A record together with its position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordLocation {
    /// The record
    pub record: Record,
    /// Sealed or pending
    pub status: RecordStatus,
}

/// Outcome of a detailed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// Recorded hash matches
    Verified,
    /// A certification exists but its hash differs
    HashMismatch,
    /// No certification for the subject
    NotFound,
}

/// Detailed verification report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Whether the supplied hash matches the recorded one
    pub is_valid: bool,
    /// What was found
    pub outcome: VerificationOutcome,
    /// Location of the matched certification
    pub status: Option<RecordStatus>,
    /// Timestamp of the matched certification
    pub recorded_at: Option<String>,
}

impl Verification {
    /// Human-readable summary
    pub fn message(&self) -> &'static str {
        match self.outcome {
            VerificationOutcome::Verified => "content hash matches the recorded certification",
            VerificationOutcome::HashMismatch => "content hash does not match the recorded certification",
            VerificationOutcome::NotFound => "no certification found for subject",
        }
    }
}
