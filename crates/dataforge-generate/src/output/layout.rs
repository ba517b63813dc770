//! Hive-style output layout.
//!
//! `<root>/<key1>=<value1>/[<key2>=<value2>/]<prefix>-<token>.parquet`, where
//! the token is a UTC timestamp, a process-wide counter and a random suffix.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dataforge_core::PartitionValue;

pub const PARQUET_EXTENSION: &str = "parquet";

static FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn partition_dir(root: &Path, partition: &PartitionValue) -> PathBuf {
    root.join(partition.relative_dir())
}

/// File name that no other call in this process, or any concurrent process,
/// will return.
pub fn unique_file_name(prefix: &str) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
    let counter = FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{prefix}-{timestamp}-{counter:06}-{}.{PARQUET_EXTENSION}",
        &suffix[..8]
    )
}

/// Entries skipped when scanning an output root: run registries and
/// staging files.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

/// Every published Parquet file under `root`, sorted by path.
pub fn list_parquet_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if root.is_dir() {
        collect_parquet_files(root, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn collect_parquet_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if is_hidden(&name) {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_parquet_files(&path, files)?;
        } else if file_type.is_file()
            && path.extension().and_then(|ext| ext.to_str()) == Some(PARQUET_EXTENSION)
        {
            files.push(path);
        }
    }
    Ok(())
}

/// Partition segments encoded in the directories between `root` and `file`.
pub fn partition_segments(root: &Path, file: &Path) -> Vec<(String, String)> {
    let Some(parent) = file.parent() else {
        return Vec::new();
    };
    let Ok(relative) = parent.strip_prefix(root) else {
        return Vec::new();
    };
    relative
        .components()
        .filter_map(|component| {
            let segment = component.as_os_str().to_str()?;
            let (key, value) = segment.split_once('=')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
