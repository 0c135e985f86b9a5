//! # Rule Store Tier Tests (T0-T5)
//!
//! End-to-end behavior of the store across every backend.
//!
//! ## Tiers
//! - T0: Normalization at ingestion
//! - T1: Deduplication & corroboration
//! - T2: Cross-validation
//! - T3: Index & search
//! - T4: Scoring
//! - T5: Persistence

use materia_core::formats::{INDEX_DOCUMENT, RULES_DOCUMENT, VALIDATION_DOCUMENT};
use materia_core::storage::LOCK_FILE;
use materia_core::{
    BackendKind, Domain, MateriaError, Operator, RuleCandidate, RuleFilter, RuleStore,
    ScoringEngine, SourceMetadata, ValidationStatus,
};
use std::collections::BTreeMap;
use std::path::Path;

const BACKENDS: [BackendKind; 3] = [BackendKind::Memory, BackendKind::Json, BackendKind::Redb];

fn open(kind: BackendKind, dir: &Path) -> RuleStore {
    let path = match kind {
        BackendKind::Redb => dir.join("rules.redb"),
        _ => dir.join("store"),
    };
    RuleStore::open(kind, &path, false).expect("open store")
}

fn material(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

fn stable_formation(source: &str) -> RuleCandidate {
    RuleCandidate::new("Formation energy < -1.0 eV/atom → Stable")
        .with_property("formation_energy")
        .with_threshold("<", -1.0)
        .with_confidence(0.75)
        .with_source(source)
}

// =============================================================================
// TIER T0: NORMALIZATION AT INGESTION
// =============================================================================

mod t0_normalization {
    use super::*;

    /// T0.1: Legacy and current record shapes land as the same canonical rule.
    #[test]
    fn legacy_shape_normalized() {
        let mut store = RuleStore::in_memory();
        let legacy = RuleCandidate::from_json(serde_json::json!({
            "rule_text": "Hull energy below 0.05 eV/atom",
            "category": "stability",
            "confidence": "0.82",
            "domain": "Battery",
            "threshold_value": 0.05,
            "operator": "<"
        }))
        .expect("legacy candidate");
        store.save(vec![legacy], None).expect("save");

        let rules = store.load(&RuleFilter::new()).expect("load");
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.confidence(), 0.82);
        assert_eq!(rule.uncertainty(), 0.18);
        assert_eq!(rule.domain, vec![Domain::Battery]);
        assert_eq!(rule.operator, Some(Operator::Lt));
        assert_eq!(rule.supported_by_papers, vec!["unknown"]);
        assert_eq!(rule.rule_frequency, 1);
    }

    /// T0.2: Unknown domains collapse to `general`.
    #[test]
    fn unknown_domain_becomes_general() {
        let mut store = RuleStore::in_memory();
        store
            .save(
                vec![RuleCandidate::new("Band gap above 2 eV")
                    .with_domain("astrophysics")
                    .with_confidence(0.9)],
                None,
            )
            .expect("save");

        let general = store
            .load(&RuleFilter::new().domain(Domain::General))
            .expect("load");
        assert_eq!(general.len(), 1);
    }

    /// T0.3: Rules below the confidence floor never reach storage.
    #[test]
    fn low_confidence_rejected() {
        let mut store = RuleStore::in_memory();
        let summary = store
            .save(vec![RuleCandidate::new("Band gap above 2 eV").with_confidence(0.59)], None)
            .expect("save");
        assert_eq!(summary.rejected.len(), 1);
        assert!(summary.rejected[0].reason.contains("confidence"));
        assert_eq!(store.stats().expect("stats").total_rules, 0);
    }
}

// =============================================================================
// TIER T1: DEDUPLICATION & CORROBORATION
// =============================================================================

mod t1_dedup {
    use super::*;

    /// T1.1: The same claim from two sources is stored once and corroborated.
    #[test]
    fn two_sources_one_rule() {
        for kind in BACKENDS {
            let dir = tempfile::tempdir().expect("tempdir");
            let mut store = open(kind, dir.path());

            let summary = store
                .save(vec![stable_formation("p1"), stable_formation("p2")], None)
                .expect("save");
            assert_eq!(summary.inserted, 1, "{kind}");
            assert_eq!(summary.duplicates, 1, "{kind}");

            let rules = store.load(&RuleFilter::new()).expect("load");
            assert_eq!(rules.len(), 1, "{kind}");
            let rule = &rules[0];
            assert_eq!(rule.supported_by_papers, vec!["p1", "p2"], "{kind}");
            assert_eq!(rule.rule_frequency, 2, "{kind}");
            assert_eq!(rule.confidence(), 0.77, "{kind}");
            assert_eq!(rule.uncertainty(), 0.23, "{kind}");
            assert_eq!(rule.validation_status, ValidationStatus::Validated, "{kind}");
        }
    }

    /// T1.2: Re-ingesting from an already listed source changes nothing.
    #[test]
    fn same_source_is_idempotent() {
        let mut store = RuleStore::in_memory();
        store.save(vec![stable_formation("p1")], None).expect("save");
        let before = store.snapshot().expect("snapshot").rules;

        let summary = store.save(vec![stable_formation("p1")], None).expect("save");
        assert_eq!(summary.duplicates, 1);
        assert_eq!(store.snapshot().expect("snapshot").rules, before);
    }

    /// T1.3: Fingerprints ignore case and surrounding whitespace only.
    #[test]
    fn fingerprint_is_textual() {
        let mut store = RuleStore::in_memory();
        store
            .save(
                vec![
                    RuleCandidate::new("Band gap above 1.1 eV").with_confidence(0.8),
                    RuleCandidate::new("  BAND GAP ABOVE 1.1 EV ").with_confidence(0.8),
                ],
                None,
            )
            .expect("save");
        assert_eq!(store.stats().expect("stats").total_rules, 1);
    }

    /// T1.4: Different phrasings of the same law stay separate rules.
    #[test]
    fn paraphrase_is_not_merged() {
        let mut store = RuleStore::in_memory();
        store
            .save(
                vec![
                    RuleCandidate::new("Band gap above 1.1 eV").with_confidence(0.8),
                    RuleCandidate::new("Band gap greater than 1.1 eV").with_confidence(0.8),
                    RuleCandidate::new("Band gap  above 1.1 eV").with_confidence(0.8),
                ],
                None,
            )
            .expect("save");
        assert_eq!(store.stats().expect("stats").total_rules, 3);
    }

    /// T1.5: Identical phrasing of different facts collides.
    #[test]
    fn identical_text_collides_across_properties() {
        let mut store = RuleStore::in_memory();
        store
            .save(
                vec![
                    RuleCandidate::new("Value above 100 is preferred")
                        .with_property("bulk_modulus")
                        .with_confidence(0.8),
                    RuleCandidate::new("Value above 100 is preferred")
                        .with_property("melting_point")
                        .with_confidence(0.8),
                ],
                None,
            )
            .expect("save");

        let rules = store.load(&RuleFilter::new()).expect("load");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].property, "bulk_modulus");
    }
}

// =============================================================================
// TIER T2: CROSS-VALIDATION
// =============================================================================

mod t2_cross_validation {
    use super::*;

    /// T2.1: A corroborated single row carries no cross-validation record.
    #[test]
    fn merged_row_is_not_a_group() {
        let mut store = RuleStore::in_memory();
        store
            .save(vec![stable_formation("p1"), stable_formation("p2")], None)
            .expect("save");

        let records = store.validation_records().expect("records");
        assert_eq!(records.len(), 1);
        let record = records.values().next().expect("record");
        assert!(!record.cross_validated);
        assert_eq!(record.rule_count, 1);
        assert_eq!(store.stats().expect("stats").cross_validated_rules, 0);
    }

    /// T2.2: Repeated saves never compound the boost.
    #[test]
    fn boost_does_not_compound() {
        let mut store = RuleStore::in_memory();
        store
            .save(
                vec![
                    stable_formation("p1"),
                    RuleCandidate::new("Band gap above 1.1 eV").with_confidence(0.8),
                ],
                None,
            )
            .expect("save");
        let first = store.load(&RuleFilter::new()).expect("load");

        for i in 0..5 {
            store
                .save(
                    vec![RuleCandidate::new(format!("Bulk modulus above {i}00 GPa"))
                        .with_confidence(0.8)],
                    None,
                )
                .expect("save");
        }

        let later = store.load(&RuleFilter::new()).expect("load");
        assert_eq!(later[0].confidence(), first[0].confidence());
        assert_eq!(later[1].confidence(), first[1].confidence());
    }

    /// T2.3: Confidence and uncertainty always sum to one.
    #[test]
    fn uncertainty_tracks_confidence() {
        let mut store = RuleStore::in_memory();
        for source in ["p1", "p2", "p3", "p4", "p5", "p6", "p7"] {
            store.save(vec![stable_formation(source)], None).expect("save");
        }
        for rule in store.load(&RuleFilter::new()).expect("load") {
            assert!((rule.confidence() + rule.uncertainty() - 1.0).abs() < 1e-9);
            assert!(rule.confidence() <= 1.0);
        }
    }
}

// =============================================================================
// TIER T3: INDEX & SEARCH
// =============================================================================

mod t3_index {
    use super::*;

    fn seeded() -> RuleStore {
        let mut store = RuleStore::in_memory();
        store
            .save(
                vec![
                    RuleCandidate::new("Optimal band gap for solar absorbers is 1.1-1.7 eV")
                        .with_property("band_gap")
                        .with_rule_type("band_gap")
                        .with_range(1.1, 1.7)
                        .with_domain("photovoltaics")
                        .with_application("solar cells")
                        .with_confidence(0.9),
                    RuleCandidate::new("Cathode voltage above 3.5 V improves energy density")
                        .with_property("voltage")
                        .with_domain("battery")
                        .with_confidence(0.8),
                ],
                None,
            )
            .expect("save");
        store
    }

    /// T3.1: Every stored rule id appears under its property and domains.
    #[test]
    fn index_covers_every_rule() {
        let store = seeded();
        let index = store.index().expect("index");
        for rule in store.load(&RuleFilter::new()).expect("load") {
            let id = rule.id().expect("id");
            assert!(index.by_property[&rule.property].contains(id));
            for domain in &rule.domain {
                assert!(index.by_domain[domain.as_str()].contains(id));
            }
        }
        assert_eq!(index.by_application["solar cells"].len(), 1);
    }

    /// T3.2: Search is case-insensitive over keywords and text.
    #[test]
    fn search_case_insensitive() {
        let store = seeded();
        assert_eq!(store.search("CATHODE").expect("search").len(), 1);
        assert_eq!(store.search("absorbers").expect("search").len(), 1);
        assert!(store.search("perovskite").expect("search").is_empty());
    }
}

// =============================================================================
// TIER T4: SCORING
// =============================================================================

mod t4_scoring {
    use super::*;

    fn wide_gap_store() -> RuleStore {
        let mut store = RuleStore::in_memory();
        store
            .save(
                vec![RuleCandidate::new("Band gap above 3.0 eV for transparent absorbers")
                    .with_property("band_gap")
                    .with_rule_type("band_gap")
                    .with_threshold(">", 3.0)
                    .with_domain("photovoltaics")
                    .with_confidence(0.85)],
                None,
            )
            .expect("save");
        store
    }

    /// T4.1: A single matching domain rule carries full domain and property weight.
    #[test]
    fn single_matching_rule() {
        let store = wide_gap_store();
        let result = ScoringEngine::new(&store)
            .score_material(&material(&[("band_gap", 3.5)]), "photovoltaics")
            .expect("score");

        assert_eq!(result.matched_rules.len(), 1);
        assert!(result.violated_rules.is_empty());
        assert_eq!(result.domain_score, 1.0);
        assert_eq!(result.property_score, 1.0);
        assert_eq!(result.synthesis_score, 0.5);
        // no stability rules and no stability inputs: heuristic stays neutral
        assert_eq!(result.stability_score, 0.5);
        // 0.5·0.3 + 1.0·0.4 + 0.5·0.2 + 1.0·0.3
        assert_eq!(result.overall_score, 0.95);
        assert!(result.reasoning.starts_with("Overall score: 0.95 (domain: photovoltaics)"));
    }

    /// T4.2: Violations pull the score down.
    #[test]
    fn violated_rule() {
        let store = wide_gap_store();
        let result = ScoringEngine::new(&store)
            .score_material(&material(&[("band_gap", 1.2)]), "photovoltaics")
            .expect("score");

        assert!(result.matched_rules.is_empty());
        assert_eq!(result.violated_rules.len(), 1);
        assert_eq!(result.domain_score, 0.0);
        assert_eq!(result.property_score, 0.0);
    }

    /// T4.3: Missing properties are skipped, not violated.
    #[test]
    fn missing_property_skipped() {
        let store = wide_gap_store();
        let result = ScoringEngine::new(&store)
            .score_material(&material(&[("density", 5.0)]), "photovoltaics")
            .expect("score");

        assert_eq!(result.rules_skipped, 1);
        assert_eq!(result.rules_violated, 0);
        assert_eq!(result.domain_score, 0.5);
    }

    /// T4.4: Scoring is deterministic.
    #[test]
    fn deterministic() {
        let store = wide_gap_store();
        let engine = ScoringEngine::new(&store);
        let props = material(&[("band_gap", 3.2), ("formation_energy", -1.4)]);
        let a = engine.score_material(&props, "photovoltaics").expect("score");
        let b = engine.score_material(&props, "photovoltaics").expect("score");
        assert_eq!(a, b);
    }

    /// T4.5: Other domains' rules are not candidates.
    #[test]
    fn foreign_domain_rules_excluded() {
        let store = wide_gap_store();
        let result = ScoringEngine::new(&store)
            .score_material(&material(&[("band_gap", 3.5)]), "battery")
            .expect("score");
        assert_eq!(result.total_rules_evaluated, 0);
    }
}

// =============================================================================
// TIER T5: PERSISTENCE
// =============================================================================

mod t5_persistence {
    use super::*;

    /// T5.1: State survives reopening for every durable backend.
    #[test]
    fn reopen_preserves_state() {
        for kind in [BackendKind::Json, BackendKind::Redb] {
            let dir = tempfile::tempdir().expect("tempdir");
            let source = SourceMetadata {
                source_id: Some("p1".into()),
                title: Some("Formation energetics".into()),
                ..SourceMetadata::default()
            };
            let before = {
                let mut store = open(kind, dir.path());
                store.save(vec![stable_formation("p1")], Some(&source)).expect("save");
                store.snapshot().expect("snapshot")
            };

            let store = open(kind, dir.path());
            assert_eq!(store.snapshot().expect("snapshot"), before, "{kind}");
            assert_eq!(store.stats().expect("stats").total_sources, 1, "{kind}");
        }
    }

    /// T5.2: The JSON backend writes its documents and releases the lock.
    #[test]
    fn json_documents_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open(BackendKind::Json, dir.path());
        store.save(vec![stable_formation("p1")], None).expect("save");

        let store_dir = dir.path().join("store");
        for name in [RULES_DOCUMENT, INDEX_DOCUMENT, VALIDATION_DOCUMENT] {
            assert!(store_dir.join(name).exists(), "{name}");
        }
        assert!(!store_dir.join(LOCK_FILE).exists());
    }

    /// T5.3: A held lock blocks writers.
    #[test]
    fn held_lock_blocks_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open(BackendKind::Json, dir.path());
        std::fs::write(dir.path().join("store").join(LOCK_FILE), "1").expect("lock");

        let result = store.save(vec![stable_formation("p1")], None);
        assert!(matches!(result, Err(MateriaError::Locked(_))));
    }

    /// T5.4: Hand-edited rule documents are normalized on read.
    #[test]
    fn hand_edited_rules_normalized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store_dir = dir.path().join("store");
        std::fs::create_dir_all(&store_dir).expect("dir");
        std::fs::write(
            store_dir.join(RULES_DOCUMENT),
            r#"[
                {"rule_id": "rule_000007", "rule_text": "Band gap above 2 eV",
                 "confidence": 0.9, "domain": ["Photovoltaics", "nonsense"]},
                42
            ]"#,
        )
        .expect("write");

        let store = open(BackendKind::Json, dir.path());
        let rules = store.load(&RuleFilter::new()).expect("load");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].domain, vec![Domain::Photovoltaics]);
        assert_eq!(rules[0].uncertainty(), 0.1);
    }

    /// T5.5: Rules persisted without an id get one and take part in scoring.
    #[test]
    fn legacy_rules_without_id_identified() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store_dir = dir.path().join("store");
        std::fs::create_dir_all(&store_dir).expect("dir");
        std::fs::write(
            store_dir.join(RULES_DOCUMENT),
            r#"[
                {"rule_text": "Band gap > 1.0 eV", "property": "band_gap",
                 "operator": ">", "threshold_value": 1.0, "confidence": 0.9}
            ]"#,
        )
        .expect("write");

        let mut store = open(BackendKind::Json, dir.path());
        store.save(vec![stable_formation("p1")], None).expect("save");

        let ids: Vec<String> = store
            .load(&RuleFilter::new())
            .expect("load")
            .iter()
            .map(|r| r.id().map(ToString::to_string).unwrap_or_default())
            .collect();
        assert_eq!(ids, vec!["rule_000001", "rule_000002"]);

        let result = ScoringEngine::new(&store)
            .score_material(&material(&[("band_gap", 2.0)]), "general")
            .expect("score");
        assert_eq!(result.rules_matched, 1);
    }

    /// T5.6: Ids sent by callers neither survive nor reorder the collection.
    #[test]
    fn supplied_ids_do_not_reorder() {
        for kind in BACKENDS {
            let dir = tempfile::tempdir().expect("tempdir");
            let mut store = open(kind, dir.path());
            for (text, id) in [("First rule 1", "rule_000050"), ("Second rule 2", "rule_000010")] {
                let mut candidate = RuleCandidate::new(text).with_confidence(0.8);
                candidate.rule_id = Some(id.to_string());
                store.save(vec![candidate], None).expect("save");
            }

            let rules = store.load(&RuleFilter::new()).expect("load");
            let texts: Vec<&str> = rules.iter().map(|r| r.rule_text.as_str()).collect();
            assert_eq!(texts, vec!["First rule 1", "Second rule 2"], "{kind}");
            let ids: Vec<String> = rules
                .iter()
                .map(|r| r.id().map(ToString::to_string).unwrap_or_default())
                .collect();
            assert_eq!(ids, vec!["rule_000001", "rule_000002"], "{kind}");
        }
    }
}
