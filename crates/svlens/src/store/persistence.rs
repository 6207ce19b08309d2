//! Snapshot persistence - save/load partition JSON files.
//!
//! Layout under the data directory:
//!
//! ```text
//! data/
//! ├── version.json
//! └── partitions/
//!     ├── aggregate_caller.json
//!     └── per_caller_genotype.json
//! ```
//!
//! Every file is first staged as a uniquely named sibling `.tmp` file and
//! only renamed into place on commit, so a reader sees either the old or
//! the new content. A staged file that is never committed is removed.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{Result, SvLensError};
use crate::input::{FileHeader, VariantRecord};

use super::version::VersionTag;

const VERSION_FILE: &str = "version.json";
const PARTITION_DIR: &str = "partitions";

static STAGE_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Serialize)]
struct SnapshotRef<'a> {
    partition: Dialect,
    saved_at: DateTime<Utc>,
    header: &'a FileHeader,
    records: Vec<&'a VariantRecord>,
}

/// A partition loaded from disk.
#[derive(Debug, Deserialize)]
pub(crate) struct PartitionSnapshot {
    pub partition: Dialect,
    pub saved_at: DateTime<Utc>,
    pub header: FileHeader,
    pub records: Vec<VariantRecord>,
}

/// Path of a partition snapshot.
pub fn partition_path(data_dir: &Path, partition: Dialect) -> PathBuf {
    data_dir
        .join(PARTITION_DIR)
        .join(format!("{}.json", partition.as_str()))
}

/// Path of the version tag file.
pub fn version_path(data_dir: &Path) -> PathBuf {
    data_dir.join(VERSION_FILE)
}

/// A file written next to its destination and not yet visible there.
#[derive(Debug)]
pub(crate) struct StagedFile {
    tmp: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Move the staged content into place.
    pub(crate) fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp, &self.path).map_err(|e| {
            SvLensError::Persistence(format!(
                "Failed to move '{}' into place: {}",
                self.tmp.display(),
                e
            ))
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

pub(crate) fn stage_partition<'a>(
    data_dir: &Path,
    partition: Dialect,
    header: &FileHeader,
    records: impl IntoIterator<Item = &'a VariantRecord>,
) -> Result<StagedFile> {
    let snapshot = SnapshotRef {
        partition,
        saved_at: Utc::now(),
        header,
        records: records.into_iter().collect(),
    };
    stage_json(&partition_path(data_dir, partition), &snapshot)
}

pub(crate) fn load_partition(data_dir: &Path, partition: Dialect) -> Result<Option<PartitionSnapshot>> {
    let path = partition_path(data_dir, partition);
    let Some(snapshot) = read_json::<PartitionSnapshot>(&path)? else {
        return Ok(None);
    };
    if snapshot.partition != partition {
        return Err(SvLensError::Persistence(format!(
            "Snapshot '{}' holds partition '{}', expected '{}'",
            path.display(),
            snapshot.partition,
            partition
        )));
    }
    Ok(Some(snapshot))
}

pub(crate) fn remove_partition(data_dir: &Path, partition: Dialect) -> Result<()> {
    remove_if_exists(&partition_path(data_dir, partition))
}

pub(crate) fn stage_version(data_dir: &Path, tag: &VersionTag) -> Result<StagedFile> {
    stage_json(&version_path(data_dir), tag)
}

pub(crate) fn load_version(data_dir: &Path) -> Result<Option<VersionTag>> {
    read_json(&version_path(data_dir))
}

pub(crate) fn remove_version(data_dir: &Path) -> Result<()> {
    remove_if_exists(&version_path(data_dir))
}

fn stage_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<StagedFile> {
    // Create parent directory if needed
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                SvLensError::Persistence(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let seq = STAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    let staged = StagedFile {
        tmp: path.with_extension(format!("json.{}.{}.tmp", std::process::id(), seq)),
        path: path.to_path_buf(),
        committed: false,
    };

    let file = File::create(&staged.tmp).map_err(|e| {
        SvLensError::Persistence(format!(
            "Failed to create file '{}': {}",
            staged.tmp.display(),
            e
        ))
    })?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|e| {
        SvLensError::Persistence(format!("Failed to serialize '{}': {}", path.display(), e))
    })?;
    writer.flush().map_err(|e| SvLensError::Io {
        path: staged.tmp.clone(),
        source: e,
    })?;

    Ok(staged)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path).map_err(|e| {
        SvLensError::Persistence(format!("Failed to open file '{}': {}", path.display(), e))
    })?;

    let value = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        SvLensError::Persistence(format!("Failed to parse '{}': {}", path.display(), e))
    })?;

    Ok(Some(value))
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SvLensError::Persistence(format!(
            "Failed to remove '{}': {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::VcfParser;
    use tempfile::TempDir;

    fn tmp_files(dir: &Path) -> usize {
        walk(dir)
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e == "tmp"))
            .count()
    }

    fn walk(dir: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                paths.extend(walk(&path));
            } else {
                paths.push(path);
            }
        }
        paths
    }

    #[test]
    fn test_partition_path() {
        let path = partition_path(Path::new("data"), Dialect::AggregateCaller);
        assert_eq!(path, Path::new("data/partitions/aggregate_caller.json"));
    }

    #[test]
    fn test_save_load_partition() {
        let dir = TempDir::new().unwrap();
        let parsed = VcfParser::new()
            .parse_str(
                "##fileformat=VCFv4.2\n\
                 #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
                 chr1\t100\tsv1\tN\t<DEL>\t30\tPASS\tSVTYPE=DEL;PRECISE;CALLER=delly\n",
            )
            .unwrap();

        let staged =
            stage_partition(dir.path(), Dialect::AggregateCaller, &parsed.header, &parsed.records)
                .unwrap();
        assert!(load_partition(dir.path(), Dialect::AggregateCaller).unwrap().is_none());
        staged.commit().unwrap();

        let loaded = load_partition(dir.path(), Dialect::AggregateCaller)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.header, parsed.header);
        assert_eq!(loaded.records, parsed.records);
        assert_eq!(tmp_files(dir.path()), 0);

        remove_partition(dir.path(), Dialect::AggregateCaller).unwrap();
        assert!(load_partition(dir.path(), Dialect::AggregateCaller).unwrap().is_none());
        // removing twice is fine
        remove_partition(dir.path(), Dialect::AggregateCaller).unwrap();
    }

    #[test]
    fn test_version_round_trip() {
        let dir = TempDir::new().unwrap();
        assert!(load_version(dir.path()).unwrap().is_none());

        let tag = VersionTag::new("v1");
        stage_version(dir.path(), &tag).unwrap().commit().unwrap();
        assert_eq!(load_version(dir.path()).unwrap(), Some(tag));
    }

    #[test]
    fn test_uncommitted_stage_is_discarded() {
        let dir = TempDir::new().unwrap();
        stage_version(dir.path(), &VersionTag::new("v1")).unwrap().commit().unwrap();

        let staged = stage_version(dir.path(), &VersionTag::new("v2")).unwrap();
        assert_eq!(tmp_files(dir.path()), 1);
        drop(staged);

        assert_eq!(tmp_files(dir.path()), 0);
        assert_eq!(load_version(dir.path()).unwrap().unwrap().tag, "v1");
    }

    #[test]
    fn test_corrupt_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = partition_path(dir.path(), Dialect::PerCallerGenotype);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            load_partition(dir.path(), Dialect::PerCallerGenotype),
            Err(SvLensError::Persistence(_))
        ));
    }
}
