use anyhow::{Context, Result, bail};
use chrono::{SecondsFormat, Utc};
use log::warn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::extract::{ClassEntry, extract_file};
use crate::walk::collect_java_files;

pub const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassIndex {
    pub version: String,
    pub jar_hash: String,
    pub generated_at: String,
    pub classes: Vec<ClassEntry>,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexSummary {
    pub parsed_files: usize,
    pub failed_files: usize,
    pub indexed_types: usize,
}

/// `"sha256:" + lowercase hex` digest of the file bytes. A pure function of
/// the archive contents, so downstream phases can use it for change
/// detection.
pub fn jar_sha256(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read jar for hashing: {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

/// Parse every `.java` file under `decompiled_dir` and write the class index
/// to `output_path`.
///
/// Files are extracted in parallel; the indexed collect keeps results in the
/// sorted walk order, so the output is deterministic regardless of thread
/// scheduling. A file that fails to parse is logged and counted, never
/// fatal. The run fails only when every attempted file failed (an index
/// without a single entry is meaningless) or when the write itself fails; a
/// tree with no source files yields an index with an empty `classes` array.
pub fn index_sources(
    decompiled_dir: &Path,
    output_path: &Path,
    jar_hash: &str,
) -> Result<IndexSummary> {
    if !decompiled_dir.is_dir() {
        bail!("Decompiled directory not found: {}", decompiled_dir.display());
    }
    // source_file paths are recorded relative to the project root, i.e. they
    // keep the `decompiled/` segment
    let rel_base = decompiled_dir.parent().unwrap_or(decompiled_dir);

    let files = collect_java_files(decompiled_dir)?;
    println!("Found {} .java files to parse", files.len());

    let results: Vec<Result<Vec<ClassEntry>>> = files
        .par_iter()
        .map(|file| extract_file(file, rel_base))
        .collect();

    let mut classes: Vec<ClassEntry> = Vec::new();
    let mut parsed_files = 0usize;
    let mut failed_files = 0usize;
    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(entries) => {
                parsed_files += 1;
                classes.extend(entries);
            }
            Err(err) => {
                failed_files += 1;
                warn!("Failed to parse {}: {err:#}", file.display());
            }
        }
    }

    if parsed_files == 0 && failed_files > 0 {
        bail!("All {failed_files} source files failed to parse");
    }

    let mut seen = HashSet::new();
    classes.retain(|entry| {
        let first = seen.insert(entry.fqcn.clone());
        if !first {
            warn!("Dropping duplicate type {} ({})", entry.fqcn, entry.source_file);
        }
        first
    });

    let index = ClassIndex {
        version: SCHEMA_VERSION.to_string(),
        jar_hash: jar_hash.to_string(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        classes,
    };
    let indexed_types = index.classes.len();

    write_index(&index, output_path)?;

    println!("Parsed {parsed_files} files successfully, {failed_files} errors");
    println!("Indexed {indexed_types} types");
    println!("Written to: {}", output_path.display());

    Ok(IndexSummary {
        parsed_files,
        failed_files,
        indexed_types,
    })
}

/// Pretty-print `index` to `output_path` via a write-then-rename, so a
/// reader never observes a partially written index.
fn write_index(index: &ClassIndex, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(index).context("Failed to serialize class index")?;

    let mut tmp_os = output_path.as_os_str().to_os_string();
    tmp_os.push(".tmp");
    let tmp = PathBuf::from(tmp_os);
    std::fs::write(&tmp, json)
        .with_context(|| format!("Failed to write class index: {}", tmp.display()))?;

    // rename replaces the target in one step on Unix; Windows needs the
    // existing file out of the way first
    #[cfg(windows)]
    if output_path.exists() {
        let _ = std::fs::remove_file(output_path);
    }
    std::fs::rename(&tmp, output_path).with_context(|| {
        format!(
            "Failed to atomically replace class index: {}",
            output_path.display()
        )
    })?;

    Ok(())
}
