//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Growth: a non-empty seal adds exactly one block and empties pending
//! - Idempotency: sealing nothing changes nothing
//! - Determinism: record and block hashes depend only on their fields
//! - Tamper evidence: any edited hash or link breaks validation

use attest_ledger::{Block, Chain, Config, Error, Ledger, MemoryStore, Record, RecordKind};
use proptest::prelude::*;
use std::sync::Arc;

/// Strategy for generating record kinds
fn kind_strategy() -> impl Strategy<Value = RecordKind> {
    prop_oneof![
        Just(RecordKind::KnowledgeCertification),
        Just(RecordKind::Achievement),
        Just(RecordKind::Copyright),
        Just(RecordKind::UserAction),
    ]
}

/// Strategy for generating content hashes
fn content_hash_strategy() -> impl Strategy<Value = String> {
    "[0-9a-f]{64}"
}

/// Strategy for generating records that pass validation
fn valid_record_strategy() -> impl Strategy<Value = Record> {
    (
        kind_strategy(),
        1i64..10_000,
        1i64..10_000,
        content_hash_strategy(),
        prop::collection::btree_map("[a-z]{1,8}", "[ -~]{0,16}", 0..4),
    )
        .prop_map(|(kind, subject, actor, hash, metadata)| {
            let mut record = Record::new(kind)
                .with_subject(subject)
                .with_actor(actor)
                .with_content_hash(hash);
            for (key, value) in metadata {
                record = record.with_metadata(key, value);
            }
            record
        })
}

/// Chain with the given records sealed one block per batch
fn chain_from_batches(batches: &[Vec<Record>]) -> Chain {
    let mut chain = Chain::new();
    for batch in batches {
        for record in batch {
            chain.submit(record.clone()).unwrap();
        }
        chain.seal();
    }
    chain
}

fn flip_char(s: &str, at: usize) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    let i = at % chars.len();
    chars[i] = if chars[i] == '0' { '1' } else { '0' };
    chars.into_iter().collect()
}

fn manual_config() -> Config {
    let mut config = Config::default();
    config.sealing.auto_seal = false;
    config.sealing.max_pending_records = 0;
    config
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: A non-empty seal grows the chain by exactly one block
    #[test]
    fn prop_seal_grows_chain_by_one(
        records in prop::collection::vec(valid_record_strategy(), 1..10)
    ) {
        let mut chain = Chain::new();
        let before = chain.len();

        for record in &records {
            prop_assert_eq!(chain.submit(record.clone()).unwrap(), before as u64);
        }

        let block = chain.seal().unwrap();
        prop_assert_eq!(chain.len(), before + 1);
        prop_assert!(chain.pending().is_empty());
        prop_assert_eq!(&block.records, &records);
        prop_assert!(chain.is_valid());
    }

    /// Property: Sealing an empty buffer is a no-op
    #[test]
    fn prop_empty_seal_is_noop(
        batches in prop::collection::vec(prop::collection::vec(valid_record_strategy(), 1..4), 0..5)
    ) {
        let mut chain = chain_from_batches(&batches);
        let blocks = chain.blocks().to_vec();

        prop_assert!(chain.seal().is_none());
        prop_assert_eq!(chain.blocks(), &blocks[..]);
    }

    /// Property: Records survive a JSON round trip
    #[test]
    fn prop_record_serde_round_trip(record in valid_record_strategy()) {
        let json = serde_json::to_string(&record).unwrap();
        let decoded: Record = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(decoded, record);
    }

    /// Property: Changing one metadata value changes the block hash
    #[test]
    fn prop_metadata_change_changes_hash(
        record in valid_record_strategy(),
        value in "[ -~]{0,16}",
    ) {
        let changed = record.clone().with_metadata("note", format!("{}!", value));
        let original = record.with_metadata("note", value);

        let a = Block::seal(1, vec![original], "0".repeat(64));
        let mut b = a.clone();
        b.records = vec![changed];

        prop_assert_ne!(a.recompute_hash(), b.recompute_hash());
    }

    /// Property: Hashing is deterministic
    #[test]
    fn prop_hash_deterministic(records in prop::collection::vec(valid_record_strategy(), 0..5)) {
        let block = Block::seal(3, records, "a".repeat(64));
        let copy: Block = serde_json::from_str(&serde_json::to_string(&block).unwrap()).unwrap();

        prop_assert_eq!(block.recompute_hash(), block.hash.clone());
        prop_assert_eq!(copy.recompute_hash(), block.hash);
    }

    /// Property: Flipping one character of any stored hash breaks validation
    #[test]
    fn prop_tampered_hash_detected(
        batches in prop::collection::vec(prop::collection::vec(valid_record_strategy(), 1..3), 0..5),
        which in any::<prop::sample::Index>(),
        at in 0usize..64,
        previous in any::<bool>(),
    ) {
        let chain = chain_from_batches(&batches);
        prop_assert!(chain.is_valid());

        let mut blocks = chain.blocks().to_vec();
        let height = which.index(blocks.len());
        if previous {
            blocks[height].previous_hash = flip_char(&blocks[height].previous_hash, at);
        } else {
            blocks[height].hash = flip_char(&blocks[height].hash, at);
        }

        prop_assert!(!Chain::from_blocks(blocks).is_valid());
    }

    /// Property: Verify matches only the recorded hash of the oldest certification
    #[test]
    fn prop_verify_semantics(
        subject in 1i64..1_000,
        first in content_hash_strategy(),
        second in content_hash_strategy(),
    ) {
        prop_assume!(first != second);

        let mut chain = Chain::new();
        chain.submit(Record::knowledge_certification(subject, 1, first.clone())).unwrap();
        chain.seal();
        chain.submit(Record::knowledge_certification(subject, 2, second.clone())).unwrap();

        prop_assert!(chain.verify(subject, &first));
        prop_assert!(!chain.verify(subject, &second));
        prop_assert!(!chain.verify(subject + 1, &first));
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_certification_lifecycle() {
        let ledger = Ledger::with_store(manual_config(), Arc::new(MemoryStore::new()))
            .await
            .unwrap();

        // 1. Certify
        let hash = "a".repeat(64);
        ledger
            .submit(Record::knowledge_certification(1, 7, hash.clone()))
            .await
            .unwrap();
        assert!(ledger.verify(1, &hash));

        // 2. Seal
        ledger.seal().await.unwrap().unwrap();
        assert_eq!(ledger.summary().chain_length, 2);
        assert_eq!(ledger.block_at(1).unwrap().records.len(), 1);

        // 3. Verify
        assert!(ledger.verify(1, &hash));
        assert!(!ledger.verify(1, &"b".repeat(64)));
        let detailed = ledger.verify_detailed(1, &hash);
        assert!(detailed.is_valid);
        assert_eq!(detailed.status.and_then(|s| s.height()), Some(1));

        // 4. Certificate
        let certificate = ledger
            .issue_certificate(1, "Lifetimes", "alice")
            .await
            .unwrap();
        assert!(certificate.validate());
        assert_eq!(ledger.certificate_for_subject(1), Some(certificate.clone()));
        assert!(ledger.verify_certificate(&certificate.certificate_id).is_valid);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_copyright_rejected() {
        let ledger = Ledger::with_store(manual_config(), Arc::new(MemoryStore::new()))
            .await
            .unwrap();

        let record = Record::new(RecordKind::Copyright).with_actor(7);
        assert!(!record.validate());
        assert!(matches!(
            ledger.submit(record).await,
            Err(Error::InvalidRecord(_))
        ));
        assert_eq!(ledger.summary().pending_count, 0);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_one_block_keeps_submission_order() {
        let ledger = Ledger::with_store(manual_config(), Arc::new(MemoryStore::new()))
            .await
            .unwrap();

        ledger
            .submit(Record::knowledge_certification(1, 7, "a".repeat(64)))
            .await
            .unwrap();
        ledger
            .submit(Record::knowledge_certification(2, 7, "b".repeat(64)))
            .await
            .unwrap();
        let block = ledger.seal().await.unwrap().unwrap();

        let subjects: Vec<Option<i64>> = block.records.iter().map(|r| r.subject_id).collect();
        assert_eq!(subjects, vec![Some(1), Some(2)]);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_rocksdb_reopen_preserves_hashes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = manual_config();
        config.data_dir = temp_dir.path().to_path_buf();

        let latest = {
            let ledger = Ledger::open(config.clone()).await.unwrap();
            ledger
                .submit(Record::knowledge_certification(9, 3, "c".repeat(64)))
                .await
                .unwrap();
            // Left pending; shutdown seals it
            ledger.shutdown().await.unwrap();
            Ledger::open(config.clone()).await.unwrap()
        };

        assert_eq!(latest.summary().chain_length, 2);
        assert!(latest.is_valid());
        assert!(latest.verify(9, &"c".repeat(64)));

        latest.shutdown().await.unwrap();
    }
}
