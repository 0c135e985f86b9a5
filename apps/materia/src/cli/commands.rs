//! # CLI Command Implementations

use crate::api::{self, IngestRequest, RulesQuery};
use crate::config::MateriaConfig;
use materia_core::formats::RULES_DOCUMENT;
use materia_core::{
    BackendKind, MateriaError, Rule, RuleBackend, RuleStore, ScoreResult, ScoringEngine, Snapshot,
    SourceMetadata, StorageBackend,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of an ingest or material file (100 MB).
const MAX_INPUT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Canonicalize an input path and check it is a regular file within the size
/// limit.
fn validate_input_file(path: &Path) -> Result<PathBuf, MateriaError> {
    let canonical = path.canonicalize().map_err(|e| {
        MateriaError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| MateriaError::Io(format!("Cannot read file metadata: {}", e)))?;
    if !metadata.is_file() {
        return Err(MateriaError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_INPUT_FILE_SIZE {
        return Err(MateriaError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_INPUT_FILE_SIZE
        )));
    }
    Ok(canonical)
}

fn read_json(path: &Path) -> Result<serde_json::Value, MateriaError> {
    let validated = validate_input_file(path)?;
    let bytes = std::fs::read(&validated)
        .map_err(|e| MateriaError::Io(format!("Read file: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| MateriaError::Deserialization(e.to_string()))
}

fn print_json(value: &impl Serialize) -> Result<(), MateriaError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| MateriaError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

/// Open the configured store.
pub fn open_store(config: &MateriaConfig) -> Result<RuleStore, MateriaError> {
    if config.storage.backend == BackendKind::Memory {
        tracing::warn!("memory backend: nothing persists after this command");
    }
    RuleStore::open(
        config.storage.backend,
        &config.storage.resolved_path(),
        config.storage.backup,
    )
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize an empty store.
pub fn cmd_init(config: &MateriaConfig, force: bool) -> Result<(), MateriaError> {
    let path = config.storage.resolved_path();
    let exists = match config.storage.backend {
        BackendKind::Json => path.join(RULES_DOCUMENT).exists(),
        BackendKind::Redb => path.exists(),
        BackendKind::Memory => false,
    };
    if exists && !force {
        return Err(MateriaError::InvalidInput(format!(
            "Store already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }
    if exists && config.storage.backend == BackendKind::Redb {
        std::fs::remove_file(&path).map_err(|e| MateriaError::Io(e.to_string()))?;
    }

    let mut backend =
        StorageBackend::open(config.storage.backend, &path, config.storage.backup)?;
    let _lock = backend.lock()?;
    backend.write_snapshot(&Snapshot::default())?;

    println!(
        "Initialized empty {} store at {}",
        config.storage.backend,
        path.display()
    );
    Ok(())
}

// =============================================================================
// INGEST COMMAND
// =============================================================================

/// `--source-id`, `--title`, `--url` flags.
#[derive(Debug, Clone, Default)]
pub struct SourceOverride {
    pub source_id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
}

impl SourceOverride {
    fn is_empty(&self) -> bool {
        self.source_id.is_none() && self.title.is_none() && self.url.is_none()
    }

    /// Flags win field by field over the file's source block.
    fn apply(self, base: Option<SourceMetadata>) -> Option<SourceMetadata> {
        if self.is_empty() {
            return base;
        }
        let mut source = base.unwrap_or_default();
        if self.source_id.is_some() {
            source.source_id = self.source_id;
        }
        if self.title.is_some() {
            source.title = self.title;
        }
        if self.url.is_some() {
            source.url = self.url;
        }
        Some(source)
    }
}

/// Parse an ingest file: a bare array of records or a wrapped batch.
pub fn parse_ingest_file(value: serde_json::Value) -> Result<IngestRequest, MateriaError> {
    match value {
        serde_json::Value::Array(rules) => Ok(IngestRequest {
            source: None,
            rules,
        }),
        object @ serde_json::Value::Object(_) => serde_json::from_value(object)
            .map_err(|e| MateriaError::Deserialization(format!("ingest file: {}", e))),
        _ => Err(MateriaError::InvalidInput(
            "ingest file must be an array of rules or an object with a \"rules\" array"
                .to_string(),
        )),
    }
}

/// Ingest candidate rules from a file.
pub fn cmd_ingest(
    config: &MateriaConfig,
    json_mode: bool,
    file: &Path,
    source: SourceOverride,
) -> Result<(), MateriaError> {
    tracing::info!("Ingesting from {}", file.display());

    let mut request = parse_ingest_file(read_json(file)?)?;
    request.source = source.apply(request.source.take());
    let (candidates, malformed) = request.candidates();

    let mut store = open_store(config)?;
    let summary = store.save(candidates, request.source.as_ref())?;
    let response = api::IngestResponse::from_summary(summary, malformed);

    if json_mode {
        return print_json(&response);
    }

    println!("Inserted:   {}", response.inserted);
    println!("Duplicates: {}", response.duplicates);
    println!("Flagged:    {}", response.flagged);
    println!("Rejected:   {}", response.rejected.len());
    if response.malformed > 0 {
        println!("Malformed:  {}", response.malformed);
    }
    for rejection in response.rejected.iter().take(10) {
        println!("  - {} ({})", rejection.rule_text, rejection.reason);
    }
    println!("Store now holds {} rules", store.stats()?.total_rules);
    Ok(())
}

// =============================================================================
// RULES / SEARCH COMMANDS
// =============================================================================

fn print_rules(rules: &[Rule], limit: usize) {
    for rule in rules.iter().take(limit) {
        let domains: Vec<&str> = rule.domain.iter().map(|d| d.as_str()).collect();
        println!(
            "{}  [{:.2}] {}  ({}; {})",
            rule.id().map_or("-", |id| id.as_str()),
            rule.confidence(),
            rule.rule_text,
            rule.rule_type.as_str(),
            domains.join(", ")
        );
    }
    if rules.len() > limit {
        println!("... and {} more", rules.len() - limit);
    }
}

/// List rules matching filters.
pub fn cmd_rules(
    config: &MateriaConfig,
    json_mode: bool,
    query: &RulesQuery,
    limit: usize,
) -> Result<(), MateriaError> {
    let filter = query
        .to_filter()
        .map_err(|e| MateriaError::InvalidInput(e.message))?;
    let rules = open_store(config)?.load(&filter)?;

    if json_mode {
        return print_json(&rules);
    }
    println!("{} matching rules", rules.len());
    print_rules(&rules, limit);
    Ok(())
}

/// Keyword search.
pub fn cmd_search(
    config: &MateriaConfig,
    json_mode: bool,
    keyword: &str,
    limit: usize,
) -> Result<(), MateriaError> {
    let rules = open_store(config)?.search(keyword)?;

    if json_mode {
        return print_json(&rules);
    }
    println!("{} rules match '{}'", rules.len(), keyword);
    print_rules(&rules, limit);
    Ok(())
}

// =============================================================================
// STATS / REPORT COMMANDS
// =============================================================================

/// Show store statistics.
pub fn cmd_stats(config: &MateriaConfig, json_mode: bool) -> Result<(), MateriaError> {
    let stats = open_store(config)?.stats()?;

    if json_mode {
        return print_json(&stats);
    }

    println!("Materia Rule Store");
    println!("==================");
    println!("Backend:  {}", config.storage.backend);
    println!("Location: {}", config.storage.resolved_path().display());
    println!();
    println!("Rules:           {}", stats.total_rules);
    println!(
        "Confidence:      {} high / {} medium / {} low",
        stats.confidence_distribution.high,
        stats.confidence_distribution.medium,
        stats.confidence_distribution.low
    );
    println!("Cross-validated: {}", stats.cross_validated_rules);
    println!("Sources:         {}", stats.total_sources);
    if let Some(last) = stats.last_update {
        println!("Last update:     {}", last);
    }
    if !stats.domains.is_empty() {
        println!();
        println!("Domains:");
        for (domain, count) in &stats.domains {
            println!("  {:<16} {}", domain, count);
        }
    }
    Ok(())
}

/// Show the quality report.
pub fn cmd_report(config: &MateriaConfig, json_mode: bool) -> Result<(), MateriaError> {
    let report = open_store(config)?.quality_report()?;

    if json_mode {
        return print_json(&report);
    }

    println!("Materia Quality Report");
    println!("======================");
    println!("Total rules:          {}", report.total_rules);
    println!(
        "High confidence:      {} ({}%)",
        report.high_confidence, report.high_confidence_percentage
    );
    println!("Medium confidence:    {}", report.medium_confidence);
    println!("Low confidence:       {}", report.low_confidence);
    println!(
        "Cross-validated:      {} ({}%)",
        report.cross_validated_rules, report.cross_validated_percentage
    );
    println!("Domain-specific tags: {}", report.domain_specific_rules);
    println!("Generic rules:        {}", report.generic_rules);
    println!("High uncertainty:     {}", report.high_uncertainty_rules);
    println!("Domains covered:      {}", report.domains_covered.join(", "));
    println!();
    println!("Quality score:        {:.3}", report.quality_score);
    Ok(())
}

// =============================================================================
// SCORE COMMAND
// =============================================================================

/// Numeric properties of a material JSON object; other values are ignored.
pub fn material_from_json(
    value: serde_json::Value,
) -> Result<BTreeMap<String, f64>, MateriaError> {
    let serde_json::Value::Object(map) = value else {
        return Err(MateriaError::InvalidInput(
            "material file must be a JSON object of property values".to_string(),
        ));
    };
    Ok(map
        .into_iter()
        .filter_map(|(name, v)| match v.as_f64() {
            Some(n) if n.is_finite() => Some((name, n)),
            _ => {
                tracing::debug!(property = %name, "ignoring non-numeric property");
                None
            }
        })
        .collect())
}

/// Parse `name=value` pairs.
pub fn parse_props(pairs: &[String]) -> Result<BTreeMap<String, f64>, MateriaError> {
    pairs
        .iter()
        .map(|pair| {
            let (name, raw) = pair.split_once('=').ok_or_else(|| {
                MateriaError::InvalidInput(format!("expected NAME=VALUE, got '{}'", pair))
            })?;
            let value: f64 = raw.trim().parse().map_err(|_| {
                MateriaError::InvalidInput(format!("'{}' is not a number in '{}'", raw, pair))
            })?;
            if !value.is_finite() {
                return Err(MateriaError::InvalidInput(format!(
                    "'{}' is not a finite number",
                    raw
                )));
            }
            Ok((name.trim().to_string(), value))
        })
        .collect()
}

fn print_score(result: &ScoreResult) {
    println!("Material score ({})", result.domain);
    println!("=====================");
    println!("Overall:    {:.3}", result.overall_score);
    println!("Domain:     {:.3}", result.domain_score);
    println!("Stability:  {:.3}", result.stability_score);
    println!("Property:   {:.3}", result.property_score);
    println!("Synthesis:  {:.3}", result.synthesis_score);
    println!();
    println!(
        "Rules: {} evaluated, {} matched, {} violated, {} skipped",
        result.total_rules_evaluated,
        result.rules_matched,
        result.rules_violated,
        result.rules_skipped
    );
    for evaluation in &result.evaluations {
        println!(
            "  {} {}  {}",
            if evaluation.matched { "+" } else { "-" },
            evaluation.rule_id.as_ref().map_or("-", |id| id.as_str()),
            evaluation.reason
        );
    }
    println!();
    println!("{}", result.reasoning);
}

/// Score a material.
pub fn cmd_score(
    config: &MateriaConfig,
    json_mode: bool,
    material: Option<&Path>,
    props: &[String],
    domain: &str,
) -> Result<(), MateriaError> {
    let properties = match material {
        Some(path) => material_from_json(read_json(path)?)?,
        None => parse_props(props)?,
    };
    if properties.is_empty() {
        return Err(MateriaError::InvalidInput(
            "no material properties given (use --material or --prop)".to_string(),
        ));
    }

    let store = open_store(config)?;
    let result = ScoringEngine::new(&store).score_material(&properties, domain)?;

    if json_mode {
        return print_json(&result);
    }
    print_score(&result);
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &MateriaConfig, host: &str, port: u16) -> Result<(), MateriaError> {
    let store = open_store(config)?;

    println!("Materia Rule Store Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", config.storage.backend);
    println!("  Location: {}", config.storage.resolved_path().display());
    println!();
    println!("Endpoints:");
    println!("  GET  /health        - Health check");
    println!("  GET  /stats         - Store statistics");
    println!("  GET  /report        - Quality report");
    println!("  GET  /rules         - List rules");
    println!("  GET  /rules/search  - Keyword search");
    println!("  POST /rules         - Ingest rules");
    println!("  POST /score         - Score a material");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(&format!("{}:{}", host, port), store).await
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_config(dir: &Path) -> MateriaConfig {
        MateriaConfig::default()
            .with_overrides(Some(dir.join("store")), Some("json"))
            .expect("config")
    }

    #[test]
    fn ingest_file_shapes() {
        let bare = parse_ingest_file(json!([{"rule_text": "Band gap 1 eV"}])).expect("bare");
        assert!(bare.source.is_none());
        assert_eq!(bare.rules.len(), 1);

        let wrapped = parse_ingest_file(json!({
            "source": {"source_id": "p1"},
            "rules": [{"rule_text": "Band gap 1 eV"}, {"rule_text": "Band gap 2 eV"}]
        }))
        .expect("wrapped");
        assert_eq!(wrapped.rules.len(), 2);
        assert_eq!(
            wrapped.source.and_then(|s| s.source_id).as_deref(),
            Some("p1")
        );

        assert!(parse_ingest_file(json!("rules")).is_err());
    }

    #[test]
    fn source_flags_override_file() {
        let flags = SourceOverride {
            title: Some("Review".into()),
            ..SourceOverride::default()
        };
        let base = SourceMetadata {
            source_id: Some("p1".into()),
            title: Some("Draft".into()),
            ..SourceMetadata::default()
        };
        let source = flags.apply(Some(base)).expect("source");
        assert_eq!(source.source_id.as_deref(), Some("p1"));
        assert_eq!(source.title.as_deref(), Some("Review"));

        assert!(SourceOverride::default().apply(None).is_none());
    }

    #[test]
    fn props_parsed() {
        let props = parse_props(&["band_gap=1.4".into(), " density = 5 ".into()]).expect("props");
        assert_eq!(props["band_gap"], 1.4);
        assert_eq!(props["density"], 5.0);
        assert!(parse_props(&["band_gap".into()]).is_err());
        assert!(parse_props(&["band_gap=wide".into()]).is_err());
        assert!(parse_props(&["band_gap=inf".into()]).is_err());
    }

    #[test]
    fn material_keeps_numeric_values() {
        let props = material_from_json(json!({
            "formula": "CsPbI3",
            "band_gap": 1.73,
            "formation_energy": -0.4
        }))
        .expect("material");
        assert_eq!(props.len(), 2);
        assert!(material_from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn init_then_ingest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = json_config(dir.path());
        cmd_init(&config, false).expect("init");
        assert!(cmd_init(&config, false).is_err());
        cmd_init(&config, true).expect("force init");

        let file = dir.path().join("rules.json");
        std::fs::write(
            &file,
            json!([
                {"rule_text": "Band gap above 3.0 eV", "property": "band_gap",
                 "operator": ">", "threshold_value": 3.0, "confidence": 0.85,
                 "domain": ["photovoltaics"]}
            ])
            .to_string(),
        )
        .expect("write");
        cmd_ingest(
            &config,
            true,
            &file,
            SourceOverride {
                source_id: Some("p1".into()),
                ..SourceOverride::default()
            },
        )
        .expect("ingest");

        let store = open_store(&config).expect("open");
        assert_eq!(store.stats().expect("stats").total_rules, 1);
        assert_eq!(store.stats().expect("stats").total_sources, 1);
    }
}
