//! EduChain Attestation Ledger
//!
//! Append-only hash-chain ledger for attestation records: knowledge
//! certifications, achievements, copyright claims and user actions.
//!
//! # Architecture
//!
//! - **Hash Chain**: Each block commits to its predecessor's hash
//! - **Single Writer**: One actor task applies every submit and seal
//! - **Canonical Hashing**: Sorted-key JSON, stable across processes
//! - **Async Persistence**: Sealed blocks are saved off the writer's path
//!
//! # Invariants
//!
//! - Append-only: Blocks never modified or deleted
//! - Linkage: `blocks[i].previous_hash == blocks[i - 1].hash`
//! - Integrity: `blocks[i].hash` recomputes from the block's contents
//! - First proof wins: the oldest certification of a subject is authoritative

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod canonical;
pub mod crypto;
pub mod chain;
pub mod storage;
pub mod ledger;
pub mod certificate;
pub mod error;
pub mod actor;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    Block, ChainStats, ChainSummary, Record, RecordKind, RecordLocation, RecordStatus,
    Verification, VerificationOutcome,
};
pub use chain::Chain;
pub use storage::{BlockStore, MemoryStore, Storage};
pub use certificate::{
    Certificate, CertificateIndex, CertificateIssuer, CertificateOutcome, CertificateVerification,
};
pub use ledger::Ledger;
pub use config::Config;
pub use metrics::Metrics;
