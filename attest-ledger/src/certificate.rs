//! Attestation certificates
//!
//! A certificate is the shareable summary of a sealed knowledge
//! certification: which content, who certified it, and which block holds the
//! proof. Rendering it (PDF, QR code) is left to the caller.

use crate::{
    chain::Chain,
    crypto::{self, HASH_HEX_LEN},
    types::{now_timestamp, RecordKind, RecordLocation, RecordStatus},
    Error, Result,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Prefix of every certificate id
pub const CERTIFICATE_PREFIX: &str = "CERT-";

/// Certificate data for a sealed knowledge certification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// `CERT-<year>-<6 digits>`
    pub certificate_id: String,
    /// Certified subject
    pub subject_id: i64,
    /// Display title of the subject
    pub subject_title: String,
    /// Certifying actor
    pub actor_id: i64,
    /// Display name of the actor
    pub actor_name: String,
    /// Recorded content hash
    pub content_hash: String,
    /// Height of the block holding the record
    pub block_height: u64,
    /// Hash of that block
    pub block_hash: String,
    /// When the record was created
    pub recorded_at: String,
    /// Public verification link
    pub verification_url: String,
    /// When the certificate was issued
    pub issued_at: String,
}

impl Certificate {
    /// Check completeness and shape
    pub fn validate(&self) -> bool {
        let text_fields = [
            &self.certificate_id,
            &self.subject_title,
            &self.actor_name,
            &self.content_hash,
            &self.block_hash,
            &self.recorded_at,
            &self.verification_url,
            &self.issued_at,
        ];

        text_fields.iter().all(|s| !s.is_empty())
            && self.certificate_id.starts_with(CERTIFICATE_PREFIX)
            && self.content_hash.len() == HASH_HEX_LEN
            && self.block_hash.len() == HASH_HEX_LEN
    }

    /// Check the certificate against the current chain
    pub fn check(&self, chain: &Chain) -> CertificateOutcome {
        if !self.validate() {
            return CertificateOutcome::Malformed;
        }

        let block = match chain.block_at(self.block_height) {
            Some(block) if block.hash == self.block_hash => block,
            _ => return CertificateOutcome::BlockMismatch,
        };

        let recorded = block.records.iter().any(|r| {
            r.certifies(self.subject_id)
                && r.actor_id == Some(self.actor_id)
                && r.content_hash.as_deref() == Some(self.content_hash.as_str())
        });
        if !recorded {
            return CertificateOutcome::RecordMissing;
        }

        if !chain.is_valid() {
            return CertificateOutcome::ChainCorrupted;
        }

        CertificateOutcome::Valid
    }
}

/// Result of checking an issued certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateOutcome {
    /// Certificate matches a sealed certification on a valid chain
    Valid,
    /// No certificate with that id was issued
    NotFound,
    /// Stored certificate fails its shape check
    Malformed,
    /// Referenced block is missing or carries a different hash
    BlockMismatch,
    /// Referenced block does not hold the certified record
    RecordMissing,
    /// Chain fails the integrity walk
    ChainCorrupted,
}

/// Certificate verification report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateVerification {
    /// Checked id
    pub certificate_id: String,
    /// Whether the certificate holds
    pub is_valid: bool,
    /// What was found
    pub outcome: CertificateOutcome,
    /// When the check ran
    pub verified_at: String,
}

impl CertificateVerification {
    /// Report for `certificate_id` with `outcome`, stamped now
    pub fn new(certificate_id: impl Into<String>, outcome: CertificateOutcome) -> Self {
        Self {
            certificate_id: certificate_id.into(),
            is_valid: outcome == CertificateOutcome::Valid,
            outcome,
            verified_at: now_timestamp(),
        }
    }

    /// Human-readable summary
    pub fn message(&self) -> &'static str {
        match self.outcome {
            CertificateOutcome::Valid => "certificate is valid",
            CertificateOutcome::NotFound => "certificate not found",
            CertificateOutcome::Malformed => "certificate is malformed",
            CertificateOutcome::BlockMismatch => "referenced block does not match the chain",
            CertificateOutcome::RecordMissing => "referenced block does not hold the certification",
            CertificateOutcome::ChainCorrupted => "chain failed integrity validation",
        }
    }
}

/// Issued certificates by id and by subject
#[derive(Debug, Default)]
pub struct CertificateIndex {
    by_id: HashMap<String, Certificate>,
    latest_by_subject: HashMap<i64, String>,
}

impl CertificateIndex {
    /// Build from stored certificates in any order
    pub fn from_certificates(mut certificates: Vec<Certificate>) -> Self {
        certificates.sort_by(|a, b| {
            (a.issued_at.as_str(), a.certificate_id.as_str())
                .cmp(&(b.issued_at.as_str(), b.certificate_id.as_str()))
        });

        let mut index = Self::default();
        for certificate in certificates {
            index.insert(certificate);
        }
        index
    }

    /// Add a certificate; it becomes the subject's latest
    pub fn insert(&mut self, certificate: Certificate) {
        self.latest_by_subject
            .insert(certificate.subject_id, certificate.certificate_id.clone());
        self.by_id
            .insert(certificate.certificate_id.clone(), certificate);
    }

    /// Whether `certificate_id` is taken
    pub fn contains(&self, certificate_id: &str) -> bool {
        self.by_id.contains_key(certificate_id)
    }

    /// Certificate by id
    pub fn get(&self, certificate_id: &str) -> Option<&Certificate> {
        self.by_id.get(certificate_id)
    }

    /// Most recently issued certificate for `subject_id`
    pub fn for_subject(&self, subject_id: i64) -> Option<&Certificate> {
        self.latest_by_subject
            .get(&subject_id)
            .and_then(|id| self.by_id.get(id))
    }

    /// Number of issued certificates
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether nothing was issued
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Builds certificates with verification links under `base_url`
#[derive(Debug, Clone)]
pub struct CertificateIssuer {
    base_url: String,
}

impl CertificateIssuer {
    /// Create an issuer
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    /// Fresh certificate id for `subject_id` sealed at `height`
    pub fn certificate_id(&self, subject_id: i64, height: u64) -> String {
        let nonce = Uuid::new_v4().simple().to_string();
        let digest = crypto::sha256_hex(format!("{}-{}-{}", subject_id, height, &nonce[..8]).as_bytes());
        // First six hex digits fit in u32
        let number = u32::from_str_radix(&digest[..6], 16).unwrap_or(0) % 1_000_000;
        format!("{}{}-{:06}", CERTIFICATE_PREFIX, Utc::now().year(), number)
    }

    /// Public verification link for a certificate
    pub fn verification_url(&self, certificate_id: &str) -> String {
        format!("{}/blockchain/certificates/{}/verify", self.base_url, certificate_id)
    }

    /// Issue a certificate for a located knowledge certification.
    ///
    /// Fails with [`Error::NotFound`] while the record is still pending.
    pub fn issue(
        &self,
        location: &RecordLocation,
        subject_title: impl Into<String>,
        actor_name: impl Into<String>,
    ) -> Result<Certificate> {
        let record = &location.record;
        if record.kind != RecordKind::KnowledgeCertification {
            return Err(Error::NotFound(format!(
                "{} record cannot be certified",
                record.kind
            )));
        }

        let (block_height, block_hash) = match &location.status {
            RecordStatus::Sealed { height, block_hash } => (*height, block_hash.clone()),
            RecordStatus::Pending => {
                return Err(Error::NotFound(
                    "certification has not been sealed into a block yet".to_string(),
                ))
            }
        };

        let (subject_id, actor_id, content_hash) =
            match (record.subject_id, record.actor_id, record.content_hash.clone()) {
                (Some(s), Some(a), Some(h)) => (s, a, h),
                _ => {
                    return Err(Error::InvalidRecord(
                        "certification is missing required fields".to_string(),
                    ))
                }
            };

        let certificate_id = self.certificate_id(subject_id, block_height);
        let verification_url = self.verification_url(&certificate_id);

        Ok(Certificate {
            certificate_id,
            subject_id,
            subject_title: subject_title.into(),
            actor_id,
            actor_name: actor_name.into(),
            content_hash,
            block_height,
            block_hash,
            recorded_at: record.created_at.clone(),
            verification_url,
            issued_at: now_timestamp(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::types::Record;

    fn sealed_location() -> RecordLocation {
        let mut chain = Chain::new();
        chain
            .submit(Record::knowledge_certification(42, 7, "a".repeat(64)))
            .unwrap();
        chain.seal().unwrap();
        chain.locate_by_subject(42).unwrap()
    }

    #[test]
    fn test_certificate_id_format() {
        let issuer = CertificateIssuer::new("https://example.org");
        let id = issuer.certificate_id(42, 1);

        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "CERT");
        assert_eq!(parts[1], Utc::now().year().to_string());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_verification_url() {
        let issuer = CertificateIssuer::new("https://example.org/");
        assert_eq!(
            issuer.verification_url("CERT-2024-000001"),
            "https://example.org/blockchain/certificates/CERT-2024-000001/verify"
        );
    }

    #[test]
    fn test_issue_for_sealed_record() {
        let issuer = CertificateIssuer::new("https://example.org");
        let location = sealed_location();

        let certificate = issuer.issue(&location, "Ownership in Rust", "alice").unwrap();
        assert_eq!(certificate.subject_id, 42);
        assert_eq!(certificate.actor_id, 7);
        assert_eq!(certificate.block_height, 1);
        assert_eq!(Some(certificate.block_hash.clone()), match &location.status {
            RecordStatus::Sealed { block_hash, .. } => Some(block_hash.clone()),
            RecordStatus::Pending => None,
        });
        assert!(certificate
            .verification_url
            .ends_with(&format!("{}/verify", certificate.certificate_id)));
        assert!(certificate.validate());
    }

    #[test]
    fn test_issue_rejects_pending() {
        let issuer = CertificateIssuer::new("https://example.org");
        let mut chain = Chain::new();
        chain
            .submit(Record::knowledge_certification(1, 7, "a".repeat(64)))
            .unwrap();
        let location = chain.locate_by_subject(1).unwrap();

        let result = issuer.issue(&location, "title", "alice");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_check_against_chain() {
        let issuer = CertificateIssuer::new("https://example.org");
        let mut chain = Chain::new();
        chain
            .submit(Record::knowledge_certification(42, 7, "a".repeat(64)))
            .unwrap();
        chain.seal().unwrap();
        let certificate = issuer
            .issue(&chain.locate_by_subject(42).unwrap(), "title", "alice")
            .unwrap();

        assert_eq!(certificate.check(&chain), CertificateOutcome::Valid);

        let mut moved = certificate.clone();
        moved.block_height = 5;
        assert_eq!(moved.check(&chain), CertificateOutcome::BlockMismatch);

        let mut rehashed = certificate.clone();
        rehashed.content_hash = "b".repeat(64);
        assert_eq!(rehashed.check(&chain), CertificateOutcome::RecordMissing);

        let mut malformed = certificate.clone();
        malformed.certificate_id = "X".to_string();
        assert_eq!(malformed.check(&chain), CertificateOutcome::Malformed);

        // A chain rebuilt with a different block at that height
        let other = {
            let mut other = Chain::new();
            other
                .submit(Record::knowledge_certification(43, 7, "a".repeat(64)))
                .unwrap();
            other.seal().unwrap();
            other
        };
        assert_eq!(certificate.check(&other), CertificateOutcome::BlockMismatch);
    }

    #[test]
    fn test_verification_report() {
        let report = CertificateVerification::new("CERT-2024-000001", CertificateOutcome::NotFound);
        assert!(!report.is_valid);
        assert_eq!(report.message(), "certificate not found");

        let report = CertificateVerification::new("CERT-2024-000001", CertificateOutcome::Valid);
        assert!(report.is_valid);
    }

    #[test]
    fn test_index_keeps_latest_per_subject() {
        let issuer = CertificateIssuer::new("https://example.org");
        let location = sealed_location();
        let first = issuer.issue(&location, "title", "alice").unwrap();
        let mut second = issuer.issue(&location, "title", "alice").unwrap();
        second.certificate_id = format!("{}-b", first.certificate_id);

        second.issued_at = format!("{}~", first.issued_at);

        // Stored order does not matter; issue time does
        let index = CertificateIndex::from_certificates(vec![second.clone(), first.clone()]);
        assert_eq!(index.len(), 2);
        assert!(index.contains(&first.certificate_id));
        assert_eq!(index.get(&first.certificate_id), Some(&first));
        assert_eq!(index.for_subject(42), Some(&second));
        assert!(index.for_subject(43).is_none());
    }

    #[test]
    fn test_validate_rejects_malformed() {
        let issuer = CertificateIssuer::new("https://example.org");
        let certificate = issuer.issue(&sealed_location(), "title", "alice").unwrap();

        let mut bad = certificate.clone();
        bad.certificate_id = "X-2024-000001".to_string();
        assert!(!bad.validate());

        let mut bad = certificate.clone();
        bad.content_hash = "abc".to_string();
        assert!(!bad.validate());

        let mut bad = certificate;
        bad.actor_name.clear();
        assert!(!bad.validate());
    }
}
