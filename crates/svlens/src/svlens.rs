//! Main SvLens struct and public API.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::charts::ChartData;
use crate::dialect::{CallerAggregator, Dialect, HandlerRegistry};
use crate::error::{Result, SvLensError};
use crate::events::{EventBus, PublishOutcome, SectionState, Signal};
use crate::export::export_vcf;
use crate::inference::{AnalyzerConfig, FieldAnalyzer};
use crate::input::{ParserConfig, VariantRecord, VcfParser};
use crate::schema::FieldMetadataMap;
use crate::store::{
    IngestProgress, Predicate, StoreConfig, VariantStore, VersionCheck, VersionTag, Window,
};

/// Input hashed between yields.
const HASH_SLICE_BYTES: usize = 1 << 20;

/// `sha256:<hex>` of `bytes`, yielding between slices.
async fn hash_content(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for slice in bytes.chunks(HASH_SLICE_BYTES) {
        hasher.update(slice);
        tokio::task::yield_now().await;
    }
    format!("sha256:{:x}", hasher.finalize())
}

/// Configuration for an SvLens report instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvLensConfig {
    /// Parser configuration.
    pub parser: ParserConfig,
    /// Field classification thresholds.
    pub analyzer: AnalyzerConfig,
    /// Store chunking and persistence.
    pub store: StoreConfig,
    /// Fail ingestion on the first record whose dialect cannot be resolved,
    /// instead of skipping it.
    pub strict_dialect: bool,
}

impl SvLensConfig {
    /// Load configuration from a JSON file. Missing keys take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SvLensError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| SvLensError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no classification or ingestion can work with.
    pub fn validate(&self) -> Result<()> {
        if self.analyzer.boolean_threshold > self.analyzer.categorical_threshold {
            return Err(SvLensError::Config(format!(
                "boolean_threshold ({}) exceeds categorical_threshold ({})",
                self.analyzer.boolean_threshold, self.analyzer.categorical_threshold
            )));
        }
        if self.store.chunk_size == 0 {
            return Err(SvLensError::Config("chunk_size must be positive".to_string()));
        }
        if self.parser.max_records == Some(0) {
            return Err(SvLensError::Config(
                "max_records must be positive or unset".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_strict_dialect(mut self, strict: bool) -> Self {
        self.strict_dialect = strict;
        self
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}

/// Outcome of one ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub partition: Dialect,
    /// Records produced by the parser.
    pub records_parsed: usize,
    /// Records now visible in the partition.
    pub records_stored: usize,
    /// Data lines the parser could not read.
    pub skipped_lines: usize,
    /// Records skipped because their dialect could not be resolved.
    pub unresolved_dialect: usize,
    /// Whether the record budget cut the input short.
    pub truncated: bool,
    pub compressed: bool,
    /// `sha256:<hex>` of the raw input bytes.
    pub content_hash: String,
    /// Version tag stored with this ingestion.
    pub version: VersionTag,
}

/// Returns a bus to its prior state unless ingestion committed.
struct LoadingGuard<'a> {
    bus: &'a EventBus,
    prior: SectionState,
    committed: bool,
}

impl<'a> LoadingGuard<'a> {
    fn enter(bus: &'a EventBus) -> Self {
        let prior = bus.state();
        bus.set_state(SectionState::Loading);
        Self {
            bus,
            prior,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
        self.bus.set_state(SectionState::Ready);
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.bus.set_state(self.prior);
        }
    }
}

/// One report instance: a partitioned store, one event bus per partition,
/// and field metadata computed on demand from the stored records.
pub struct SvLens {
    config: SvLensConfig,
    parser: VcfParser,
    analyzer: FieldAnalyzer,
    registry: Arc<HandlerRegistry>,
    store: Arc<VariantStore>,
    buses: HashMap<Dialect, EventBus>,
    metadata: RwLock<HashMap<Dialect, Arc<FieldMetadataMap>>>,
}

impl Default for SvLens {
    fn default() -> Self {
        Self::new()
    }
}

impl SvLens {
    /// Create a new SvLens instance with default configuration.
    pub fn new() -> Self {
        Self::with_config(SvLensConfig::default())
    }

    /// Create an SvLens instance with custom configuration.
    pub fn with_config(config: SvLensConfig) -> Self {
        let registry = Arc::new(HandlerRegistry::new());
        let store = Arc::new(VariantStore::new(config.store.clone(), Arc::clone(&registry)));
        let buses = Dialect::ALL
            .iter()
            .map(|&d| (d, EventBus::new(d.as_str())))
            .collect();

        Self {
            parser: VcfParser::with_config(config.parser.clone()),
            analyzer: FieldAnalyzer::with_config(config.analyzer.clone()),
            config,
            registry,
            store,
            buses,
            metadata: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SvLensConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn store(&self) -> &VariantStore {
        &self.store
    }

    /// The event bus of one report section.
    pub fn bus(&self, partition: Dialect) -> &EventBus {
        // Both dialects get a bus in `with_config`.
        &self.buses[&partition]
    }

    /// Reload persisted partitions. Sections with data become ready.
    pub async fn init(&self) -> Result<usize> {
        let loaded = self.store.init().await?;
        for partition in self.store.partitions().await {
            self.bus(partition).set_state(SectionState::Ready);
        }
        Ok(loaded)
    }

    /// Parse `bytes` and replace the partition with its records.
    ///
    /// The section is `Loading` while this runs and `Ready` afterwards;
    /// on error or cancellation it returns to its previous state. Without
    /// an explicit `version`, a tag derived from the content is stored.
    ///
    /// Hashing, parsing and caller aggregation each work through the input
    /// in `chunk_size` pieces and yield between them.
    pub async fn ingest(
        &self,
        partition: Dialect,
        bytes: &[u8],
        version: Option<VersionTag>,
        progress: Option<&(dyn Fn(IngestProgress) + Send + Sync)>,
    ) -> Result<IngestReport> {
        let permit = self.store.begin_ingest(partition)?;
        let bus = self.bus(partition);
        let guard = LoadingGuard::enter(bus);

        let content_hash = hash_content(bytes).await;
        let chunk_size = self.store.config().chunk_size.max(1);

        let mut stream = self.parser.stream(bytes)?;
        let compressed = stream.is_compressed();
        let mut records = Vec::new();
        let mut unresolved_dialect = 0usize;
        let mut aggregator = CallerAggregator::new();

        while let Some(batch) = stream.next_batch(chunk_size)? {
            for record in batch {
                let Some(record) = self.classify(partition, record)? else {
                    unresolved_dialect += 1;
                    continue;
                };
                let record = self.registry.derive(record, partition);
                if partition == Dialect::AggregateCaller {
                    aggregator.observe(&record);
                }
                records.push(record);
            }
            tokio::task::yield_now().await;
        }
        let records_parsed = stream.records_read();

        if unresolved_dialect > 0 {
            warn!(partition = %partition, unresolved = unresolved_dialect, "Skipped records with unresolved dialect");
        }

        if !aggregator.is_empty() {
            debug!(partition = %partition, loci = aggregator.group_count(), "Aggregating single-caller records");
            let mut aggregated = Vec::with_capacity(records.len());
            let mut remaining = records.into_iter().peekable();
            while remaining.peek().is_some() {
                aggregated.extend(remaining.by_ref().take(chunk_size).map(|r| aggregator.apply(r)));
                tokio::task::yield_now().await;
            }
            records = aggregated;
        }

        let parsed = stream.finish(records);
        let records_stored = self
            .store
            .store_records_with(&permit, parsed.header, parsed.records, progress)
            .await?;
        self.metadata.write().await.remove(&partition);

        let version = version.unwrap_or_else(|| VersionTag::new(content_hash.clone()));
        self.store.store_version_tag(version.clone()).await?;

        guard.commit();
        drop(permit);
        bus.publish(Signal::RefreshNeeded("ingested".to_string()));

        info!(
            partition = %partition,
            records_stored,
            skipped = parsed.skipped.len(),
            unresolved_dialect,
            "Ingestion complete"
        );

        Ok(IngestReport {
            partition,
            records_parsed,
            records_stored,
            skipped_lines: parsed.skipped.len(),
            unresolved_dialect,
            truncated: parsed.truncated,
            compressed,
            content_hash,
            version,
        })
    }

    /// Read a call file from disk and ingest it.
    pub async fn ingest_file(
        &self,
        partition: Dialect,
        path: impl AsRef<Path>,
        version: Option<VersionTag>,
    ) -> Result<IngestReport> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| SvLensError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.ingest(partition, &bytes, version, None).await
    }

    /// Keep a record of `partition`'s dialect. Another dialect is an error;
    /// an unresolvable record yields `None` unless `strict_dialect` is set.
    fn classify(&self, partition: Dialect, record: VariantRecord) -> Result<Option<VariantRecord>> {
        match self.registry.identify(&record) {
            Ok(found) if found == partition => Ok(Some(record)),
            Ok(found) => Err(SvLensError::DialectMismatch {
                expected: partition,
                found,
                line: record.source_line,
            }),
            Err(e) if self.config.strict_dialect => Err(e),
            Err(e) => {
                debug!(error = %e, "Skipping record");
                Ok(None)
            }
        }
    }

    /// Field metadata for a partition, computed from its current records.
    pub async fn field_metadata(&self, partition: Dialect) -> Arc<FieldMetadataMap> {
        if let Some(cached) = self.metadata.read().await.get(&partition) {
            return Arc::clone(cached);
        }

        // Held across the computation so an ingestion that lands meanwhile
        // invalidates after this insert, not before it.
        let mut cache = self.metadata.write().await;
        if let Some(cached) = cache.get(&partition) {
            return Arc::clone(cached);
        }
        let records = self.store.records(partition).await;
        let fields = Arc::new(self.analyzer.build_field_metadata(records.as_slice(), &self.registry));
        cache.insert(partition, Arc::clone(&fields));
        fields
    }

    pub async fn query(
        &self,
        partition: Dialect,
        predicate: &Predicate,
        window: Window,
    ) -> Vec<Arc<VariantRecord>> {
        self.store.query(partition, predicate, window).await
    }

    pub async fn count(&self, partition: Dialect, predicate: &Predicate) -> usize {
        self.store.count(partition, predicate).await
    }

    /// Filter the partition and announce the result to its views.
    pub async fn apply_selection(
        &self,
        partition: Dialect,
        predicate: &Predicate,
    ) -> PublishOutcome {
        let rows = self.query(partition, predicate, Window::all()).await;
        self.bus(partition)
            .publish(Signal::filtered_rows(Arc::new(rows)))
    }

    /// Chart aggregates over the partition's current records.
    pub async fn chart_data(&self, partition: Dialect) -> ChartData {
        let records = self.store.records(partition).await;
        ChartData::build(records.as_slice(), &self.registry, partition)
    }

    /// Header plus every matching record as call-file text.
    pub async fn export(&self, partition: Dialect, predicate: &Predicate) -> String {
        let header = self.store.header(partition).await.unwrap_or_default();
        let records = self.query(partition, predicate, Window::all()).await;
        export_vcf(&header, records.iter().map(Arc::as_ref))
    }

    pub async fn check_version(&self, candidate: &VersionTag) -> VersionCheck {
        self.store.check_version(candidate).await
    }

    /// Drop every partition and return all sections to `Uninitialized`.
    pub async fn reset(&self) -> Result<()> {
        self.store.clear_all().await?;
        self.metadata.write().await.clear();
        for bus in self.buses.values() {
            bus.set_state(SectionState::Uninitialized);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SignalKind;
    use crate::schema::FieldType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HEADER: &str = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tmerged\n";

    fn aggregate_text() -> String {
        format!(
            "{HEADER}\
             chr1\t100\t.\tN\t<DEL>\t30\tPASS\tSVTYPE=DEL;SVLEN=-500;SUPP_CALLERS=delly,manta\tGT\t0/1\n\
             chr1\t900\t.\tN\t<DUP>\t45\tPASS\tSVTYPE=DUP;SVLEN=1200;SUPP_CALLERS=manta\tGT\t0/1\n\
             chr2\t50\t.\tN\t<INS>\t10\tPASS\tSVTYPE=INS;SVLEN=80;SUPP_CALLERS=delly\tGT\t1/1\n"
        )
    }

    #[tokio::test]
    async fn test_ingest_and_metadata() {
        let lens = SvLens::new();
        let report = lens
            .ingest(Dialect::AggregateCaller, aggregate_text().as_bytes(), None, None)
            .await
            .unwrap();

        assert_eq!(report.records_stored, 3);
        assert_eq!(report.unresolved_dialect, 0);
        assert_eq!(report.version.tag, report.content_hash);

        let fields = lens.field_metadata(Dialect::AggregateCaller).await;
        let svtype = &fields["SVTYPE"];
        assert_eq!(svtype.field_type, FieldType::Categorical);
        assert_eq!(svtype.unique_values, vec!["DEL", "DUP", "INS"]);
        assert!(!svtype.has_null);
        assert_eq!(lens.bus(Dialect::AggregateCaller).state(), SectionState::Ready);
    }

    #[tokio::test]
    async fn test_dialect_mismatch_restores_state() {
        let lens = SvLens::new();
        let err = lens
            .ingest(Dialect::PerCallerGenotype, aggregate_text().as_bytes(), None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, SvLensError::DialectMismatch { line: 3, .. }));
        assert_eq!(
            lens.bus(Dialect::PerCallerGenotype).state(),
            SectionState::Uninitialized
        );
    }

    #[tokio::test]
    async fn test_unresolved_records_skipped_or_rejected() {
        let text = format!(
            "{}chr1\t5\t.\tA\tT\t.\tPASS\tSVTYPE=DEL\tGT\t0/1\n",
            aggregate_text()
        );

        let lens = SvLens::new();
        let report = lens
            .ingest(Dialect::AggregateCaller, text.as_bytes(), None, None)
            .await
            .unwrap();
        assert_eq!(report.records_parsed, 4);
        assert_eq!(report.unresolved_dialect, 1);

        let strict = SvLens::with_config(SvLensConfig::default().with_strict_dialect(true));
        let err = strict
            .ingest(Dialect::AggregateCaller, text.as_bytes(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SvLensError::DialectResolution { line: 6, .. }));
    }

    #[tokio::test]
    async fn test_metadata_invalidated_by_reingest() {
        let lens = SvLens::new();
        lens.ingest(Dialect::AggregateCaller, aggregate_text().as_bytes(), None, None)
            .await
            .unwrap();
        assert_eq!(lens.field_metadata(Dialect::AggregateCaller).await["SVTYPE"].unique_count(), 3);

        let smaller = format!(
            "{HEADER}chr1\t100\t.\tN\t<DEL>\t30\tPASS\tSVTYPE=DEL;SUPP_CALLERS=delly\tGT\t0/1\n"
        );
        lens.ingest(Dialect::AggregateCaller, smaller.as_bytes(), None, None)
            .await
            .unwrap();
        assert_eq!(lens.field_metadata(Dialect::AggregateCaller).await["SVTYPE"].unique_count(), 1);
    }

    #[tokio::test]
    async fn test_apply_selection_publishes_rows() {
        let lens = SvLens::new();
        lens.ingest(Dialect::AggregateCaller, aggregate_text().as_bytes(), None, None)
            .await
            .unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let _sub = lens
            .bus(Dialect::AggregateCaller)
            .subscribe(SignalKind::FilteredRowsChanged, move |signal| {
                if let Signal::FilteredRowsChanged { count, .. } = signal {
                    counter.store(*count, Ordering::SeqCst);
                }
            });

        let predicate = Predicate::all().callers("SUPP_CALLERS", ["delly"]);
        let outcome = lens.apply_selection(Dialect::AggregateCaller, &predicate).await;
        assert_eq!(outcome, PublishOutcome::Delivered(1));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_export_filtered() {
        let lens = SvLens::new();
        lens.ingest(Dialect::AggregateCaller, aggregate_text().as_bytes(), None, None)
            .await
            .unwrap();

        let text = lens
            .export(Dialect::AggregateCaller, &Predicate::all().exact("SVTYPE", "DUP"))
            .await;
        let data: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(data.len(), 1);
        assert!(data[0].starts_with("chr1\t900"));
    }

    #[tokio::test]
    async fn test_reset() {
        let lens = SvLens::new();
        lens.ingest(Dialect::AggregateCaller, aggregate_text().as_bytes(), None, None)
            .await
            .unwrap();
        lens.reset().await.unwrap();

        assert_eq!(lens.count(Dialect::AggregateCaller, &Predicate::all()).await, 0);
        assert_eq!(lens.bus(Dialect::AggregateCaller).state(), SectionState::Uninitialized);
        assert!(!lens.field_metadata(Dialect::AggregateCaller).await.contains_key("SVTYPE"));
    }

    #[test]
    fn test_config_validation() {
        assert!(SvLensConfig::default().validate().is_ok());

        let mut config = SvLensConfig::default();
        config.store.chunk_size = 0;
        assert!(matches!(config.validate(), Err(SvLensError::Config(_))));
    }

    #[test]
    fn test_config_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svlens.json");
        std::fs::write(&path, r#"{"strict_dialect": true, "parser": {"max_records": null}}"#).unwrap();

        let config = SvLensConfig::from_json_file(&path).unwrap();
        assert!(config.strict_dialect);
        assert_eq!(config.parser.max_records, None);
        assert_eq!(config.store.chunk_size, crate::store::DEFAULT_CHUNK_SIZE);

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(SvLensConfig::from_json_file(&path), Err(SvLensError::Config(_))));
    }
}
