//! Partitioned record store with chunked ingestion and windowed queries.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::dialect::{Dialect, HandlerRegistry};
use crate::error::{Result, SvLensError};
use crate::input::{FileHeader, VariantRecord};

use super::persistence;
use super::predicate::{Predicate, Window};
use super::version::{VersionCheck, VersionTag};

/// Records staged per chunk when the caller has no preference.
pub const DEFAULT_CHUNK_SIZE: usize = 2_000;

/// Store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Records per ingestion chunk.
    pub chunk_size: usize,
    /// Directory for persisted snapshots; in-memory only when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            data_dir: None,
        }
    }
}

impl StoreConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }
}

/// Progress report passed to ingestion callbacks between chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestProgress {
    /// Zero-based index of the chunk just staged.
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub bytes_done: usize,
    pub bytes_total: usize,
}

/// Shared, immutable record list of one partition.
pub type RecordSet = Arc<Vec<Arc<VariantRecord>>>;

#[derive(Debug, Clone, Default)]
struct Partition {
    header: FileHeader,
    records: RecordSet,
}

/// Exclusive right to replace one partition.
///
/// Released on drop, including when the ingesting future is dropped
/// mid-way. While held, any other ingestion or clear of the partition
/// fails with [`SvLensError::StorageContention`].
#[derive(Debug)]
pub struct IngestPermit<'a> {
    in_flight: &'a Mutex<HashSet<Dialect>>,
    partition: Dialect,
}

impl<'a> IngestPermit<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<Dialect>>, partition: Dialect) -> Result<Self> {
        let mut set = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(partition) {
            return Err(SvLensError::StorageContention { partition });
        }
        Ok(Self {
            in_flight,
            partition,
        })
    }

    pub fn partition(&self) -> Dialect {
        self.partition
    }
}

impl Drop for IngestPermit<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.partition);
    }
}

/// Run file work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SvLensError::Persistence(format!("Persistence task failed: {}", e)))?
}

/// Queryable, versioned collection of records keyed by dialect partition.
///
/// Writes build the new partition content off to the side and swap it in
/// under the write lock, so readers only ever see the previous content or
/// the complete new content.
#[derive(Debug)]
pub struct VariantStore {
    config: StoreConfig,
    registry: Arc<HandlerRegistry>,
    partitions: RwLock<HashMap<Dialect, Partition>>,
    in_flight: Mutex<HashSet<Dialect>>,
    version: RwLock<Option<VersionTag>>,
}

impl VariantStore {
    /// Create an empty store.
    pub fn new(config: StoreConfig, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            config,
            registry,
            partitions: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            version: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Load persisted partitions and the version tag, if a data directory
    /// is configured. Returns the number of partitions loaded.
    pub async fn init(&self) -> Result<usize> {
        let Some(dir) = self.config.data_dir.as_deref() else {
            return Ok(0);
        };

        let dir = dir.to_path_buf();
        let (loaded, tag) = blocking({
            let dir = dir.clone();
            move || {
                let mut loaded = HashMap::new();
                for dialect in Dialect::ALL {
                    if let Some(snapshot) = persistence::load_partition(&dir, dialect)? {
                        debug!(
                            partition = %dialect,
                            records = snapshot.records.len(),
                            saved_at = %snapshot.saved_at,
                            "Loaded partition snapshot"
                        );
                        loaded.insert(
                            dialect,
                            Partition {
                                header: snapshot.header,
                                records: Arc::new(
                                    snapshot.records.into_iter().map(Arc::new).collect(),
                                ),
                            },
                        );
                    }
                }
                Ok((loaded, persistence::load_version(&dir)?))
            }
        })
        .await?;

        let count = loaded.len();
        *self.partitions.write().await = loaded;
        *self.version.write().await = tag;

        info!(partitions = count, dir = %dir.display(), "Store initialised");
        Ok(count)
    }

    /// Claim a partition for ingestion.
    ///
    /// Hold the permit across the whole ingestion pass and hand it to
    /// [`VariantStore::store_records_with`].
    pub fn begin_ingest(&self, partition: Dialect) -> Result<IngestPermit<'_>> {
        IngestPermit::acquire(&self.in_flight, partition)
    }

    /// Replace a partition wholesale with `records`.
    ///
    /// Records are staged in chunks of `chunk_size`; `progress` runs after
    /// each chunk and the task yields before the next one. Nothing is
    /// visible to readers until the final swap. A concurrent call for the
    /// same partition fails with [`SvLensError::StorageContention`].
    pub async fn store_records(
        &self,
        partition: Dialect,
        header: FileHeader,
        records: Vec<VariantRecord>,
        progress: Option<&(dyn Fn(IngestProgress) + Send + Sync)>,
    ) -> Result<usize> {
        let permit = self.begin_ingest(partition)?;
        self.store_records_with(&permit, header, records, progress)
            .await
    }

    /// [`VariantStore::store_records`] under a permit the caller already holds.
    ///
    /// The snapshot file is written on the blocking pool, then renamed into
    /// place and swapped into memory under one write guard. Dropping the
    /// future before that point leaves disk and memory on the old content.
    pub async fn store_records_with(
        &self,
        permit: &IngestPermit<'_>,
        header: FileHeader,
        records: Vec<VariantRecord>,
        progress: Option<&(dyn Fn(IngestProgress) + Send + Sync)>,
    ) -> Result<usize> {
        let partition = permit.partition();
        let chunk_size = self.config.chunk_size.max(1);
        let total_chunks = records.len().div_ceil(chunk_size);
        let bytes_total: usize = records.iter().map(VariantRecord::approx_size).sum();

        let mut staged: Vec<Arc<VariantRecord>> = Vec::with_capacity(records.len());
        let mut bytes_done = 0usize;
        let mut remaining = records.into_iter().peekable();
        let mut chunk_index = 0usize;

        while remaining.peek().is_some() {
            for record in remaining.by_ref().take(chunk_size) {
                bytes_done += record.approx_size();
                staged.push(Arc::new(record));
            }

            let report = IngestProgress {
                chunk_index,
                total_chunks,
                bytes_done,
                bytes_total,
            };
            debug!(partition = %partition, chunk = chunk_index, total_chunks, "Staged chunk");
            if let Some(callback) = progress {
                callback(report);
            }
            chunk_index += 1;
            tokio::task::yield_now().await;
        }

        let staged: RecordSet = Arc::new(staged);
        let snapshot = match self.config.data_dir.clone() {
            Some(dir) => {
                let header = header.clone();
                let records = Arc::clone(&staged);
                Some(
                    blocking(move || {
                        persistence::stage_partition(
                            &dir,
                            partition,
                            &header,
                            records.iter().map(Arc::as_ref),
                        )
                    })
                    .await?,
                )
            }
            None => None,
        };

        let stored = staged.len();
        let mut partitions = self.partitions.write().await;
        if let Some(snapshot) = snapshot {
            snapshot.commit()?;
        }
        partitions.insert(
            partition,
            Partition {
                header,
                records: staged,
            },
        );
        drop(partitions);

        info!(partition = %partition, records = stored, "Partition replaced");
        Ok(stored)
    }

    /// Remove every record of a partition.
    pub async fn clear_partition(&self, partition: Dialect) -> Result<()> {
        let _permit = self.begin_ingest(partition)?;
        if let Some(dir) = self.config.data_dir.as_deref() {
            persistence::remove_partition(dir, partition)?;
        }
        self.partitions.write().await.remove(&partition);
        debug!(partition = %partition, "Partition cleared");
        Ok(())
    }

    /// Remove every partition and the version tag.
    pub async fn clear_all(&self) -> Result<()> {
        if let Some(dir) = self.config.data_dir.as_deref() {
            for dialect in Dialect::ALL {
                persistence::remove_partition(dir, dialect)?;
            }
            persistence::remove_version(dir)?;
        }
        self.partitions.write().await.clear();
        *self.version.write().await = None;
        info!("Store cleared");
        Ok(())
    }

    /// Records of a partition matching `predicate`, sliced by `window`, in
    /// ingestion order. Unknown partitions yield no records.
    pub async fn query(
        &self,
        partition: Dialect,
        predicate: &Predicate,
        window: Window,
    ) -> Vec<Arc<VariantRecord>> {
        let records = self.records(partition).await;
        let matching = records
            .iter()
            .filter(|r| predicate.matches(r, partition, &self.registry))
            .skip(window.offset)
            .cloned();

        match window.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    /// Number of records matching `predicate`.
    pub async fn count(&self, partition: Dialect, predicate: &Predicate) -> usize {
        let records = self.records(partition).await;
        if predicate.is_empty() {
            return records.len();
        }
        records
            .iter()
            .filter(|r| predicate.matches(r, partition, &self.registry))
            .count()
    }

    /// Snapshot of a partition's records.
    pub async fn records(&self, partition: Dialect) -> RecordSet {
        self.partitions
            .read()
            .await
            .get(&partition)
            .map(|p| Arc::clone(&p.records))
            .unwrap_or_default()
    }

    /// Header the partition was ingested with.
    pub async fn header(&self, partition: Dialect) -> Option<FileHeader> {
        self.partitions
            .read()
            .await
            .get(&partition)
            .map(|p| p.header.clone())
    }

    /// Partitions currently holding records.
    pub async fn partitions(&self) -> Vec<Dialect> {
        let mut dialects: Vec<Dialect> = self.partitions.read().await.keys().copied().collect();
        dialects.sort();
        dialects
    }

    /// Whether an ingestion of the partition is running.
    pub fn is_ingesting(&self, partition: Dialect) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&partition)
    }

    /// Record the tag of the content now in the store.
    pub async fn store_version_tag(&self, tag: VersionTag) -> Result<()> {
        let staged = match self.config.data_dir.clone() {
            Some(dir) => {
                let tag = tag.clone();
                Some(blocking(move || persistence::stage_version(&dir, &tag)).await?)
            }
            None => None,
        };

        let mut version = self.version.write().await;
        if let Some(staged) = staged {
            staged.commit()?;
        }
        *version = Some(tag);
        Ok(())
    }

    pub async fn get_version_tag(&self) -> Option<VersionTag> {
        self.version.read().await.clone()
    }

    /// Compare the stored tag against `candidate`.
    pub async fn check_version(&self, candidate: &VersionTag) -> VersionCheck {
        let check = VersionCheck::compare(self.version.read().await.as_ref(), candidate);
        if let Some(reason) = &check.reason {
            warn!(reason = %reason, "Version mismatch");
        }
        check
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::VcfParser;

    fn records(n: usize) -> Vec<VariantRecord> {
        let mut text = String::from("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n");
        for i in 0..n {
            text.push_str(&format!(
                "chr1\t{}\t.\tN\t<DEL>\t{}\tPASS\tSVTYPE=DEL;SUPP_CALLERS=delly\n",
                i + 1,
                i
            ));
        }
        VcfParser::new().parse_str(&text).unwrap().records
    }

    fn store(chunk_size: usize) -> VariantStore {
        VariantStore::new(
            StoreConfig::default().with_chunk_size(chunk_size),
            Arc::new(HandlerRegistry::new()),
        )
    }

    #[tokio::test]
    async fn test_store_and_query() {
        let store = store(10);
        let stored = store
            .store_records(Dialect::AggregateCaller, FileHeader::default(), records(25), None)
            .await
            .unwrap();
        assert_eq!(stored, 25);

        let all = store
            .query(Dialect::AggregateCaller, &Predicate::all(), Window::all())
            .await;
        assert_eq!(all.len(), 25);

        let page = store
            .query(Dialect::AggregateCaller, &Predicate::all(), Window::new(20, 10))
            .await;
        assert_eq!(page.len(), 5);
        assert_eq!(page[0].position, 21);

        let filtered = Predicate::all().range("QUAL", Some(10.0), Some(14.0));
        assert_eq!(store.count(Dialect::AggregateCaller, &filtered).await, 5);
    }

    #[tokio::test]
    async fn test_progress_between_chunks() {
        let store = store(10);
        let reports = Mutex::new(Vec::new());
        let callback = |p: IngestProgress| reports.lock().unwrap().push(p);

        store
            .store_records(Dialect::AggregateCaller, FileHeader::default(), records(25), Some(&callback))
            .await
            .unwrap();

        let reports = reports.into_inner().unwrap();
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|p| p.total_chunks == 3));
        assert_eq!(reports.last().unwrap().bytes_done, reports[0].bytes_total);
        assert!(reports.windows(2).all(|w| w[0].bytes_done < w[1].bytes_done));
    }

    #[tokio::test]
    async fn test_contention_is_retryable() {
        let store = store(10);
        let _permit = store.begin_ingest(Dialect::AggregateCaller).unwrap();

        let err = store
            .store_records(Dialect::AggregateCaller, FileHeader::default(), records(1), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        // the other partition is unaffected
        store
            .store_records(Dialect::PerCallerGenotype, FileHeader::default(), Vec::new(), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_partition_is_empty() {
        let store = store(10);
        assert!(store
            .query(Dialect::PerCallerGenotype, &Predicate::all(), Window::all())
            .await
            .is_empty());
        assert!(store.header(Dialect::PerCallerGenotype).await.is_none());
    }

    #[tokio::test]
    async fn test_version_check() {
        let store = store(10);
        let tag = VersionTag::new("abc");
        assert!(store.check_version(&tag).await.mismatch);

        store.store_version_tag(tag.clone()).await.unwrap();
        assert!(!store.check_version(&tag).await.mismatch);
        assert!(store.check_version(&VersionTag::new("def")).await.mismatch);
    }

    #[tokio::test]
    async fn test_permit_spans_caller_work() {
        let store = store(10);
        let permit = store.begin_ingest(Dialect::AggregateCaller).unwrap();
        assert!(store.is_ingesting(Dialect::AggregateCaller));
        assert!(matches!(
            store.begin_ingest(Dialect::AggregateCaller),
            Err(SvLensError::StorageContention { .. })
        ));

        let stored = store
            .store_records_with(&permit, FileHeader::default(), records(3), None)
            .await
            .unwrap();
        assert_eq!(stored, 3);
        // still claimed until the permit goes away
        assert!(store.is_ingesting(Dialect::AggregateCaller));

        drop(permit);
        assert!(!store.is_ingesting(Dialect::AggregateCaller));
    }

    #[tokio::test]
    async fn test_cancelled_commit_leaves_disk_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = VariantStore::new(
            StoreConfig::default().with_chunk_size(10).with_data_dir(dir.path()),
            Arc::new(HandlerRegistry::new()),
        );

        let reader = store.partitions.read().await;
        let attempt = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            store.store_records(Dialect::AggregateCaller, FileHeader::default(), records(5), None),
        )
        .await;
        assert!(attempt.is_err());
        drop(reader);

        assert!(persistence::load_partition(dir.path(), Dialect::AggregateCaller)
            .unwrap()
            .is_none());
        let leftovers = std::fs::read_dir(dir.path().join("partitions"))
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
        assert!(!store.is_ingesting(Dialect::AggregateCaller));

        store.init().await.unwrap();
        assert_eq!(store.count(Dialect::AggregateCaller, &Predicate::all()).await, 0);
    }
}
