use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const FRESH_MANIFEST: &[u8] = b"Manifest-Version: 1.0\r\n\r\n";

/// Copy `source_jar` to `target_jar`, keeping only entries under `META-INF/`
/// (the manifest itself is regenerated fresh) and entries whose path starts
/// with one of `include_prefixes`. Returns the number of entries copied.
///
/// An empty prefix list disables package filtering: everything except the
/// original manifest is kept.
pub fn filter_jar(source_jar: &Path, target_jar: &Path, include_prefixes: &[String]) -> Result<u64> {
    let file = File::open(source_jar)
        .with_context(|| format!("Failed to open jar: {}", source_jar.display()))?;
    // SAFETY: The file is opened read-only and remains valid for the lifetime of the mmap.
    // The mmap is dropped before the file, ensuring memory safety.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to mmap jar: {}", source_jar.display()))?;
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("Failed to read zip structure: {}", source_jar.display()))?;

    let out = File::create(target_jar)
        .with_context(|| format!("Failed to create filtered jar: {}", target_jar.display()))?;
    let mut writer = ZipWriter::new(out);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file("META-INF/MANIFEST.MF", options)?;
    writer.write_all(FRESH_MANIFEST)?;

    let mut count = 0u64;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if !should_include(&name, include_prefixes) {
            continue;
        }

        if entry.is_dir() {
            writer.add_directory(name, options)?;
        } else {
            writer.start_file(name, options)?;
            std::io::copy(&mut entry, &mut writer)
                .with_context(|| format!("Failed to copy jar entry #{i}"))?;
        }
        count += 1;
    }

    writer
        .finish()
        .with_context(|| format!("Failed to finish filtered jar: {}", target_jar.display()))?;
    Ok(count)
}

fn should_include(entry_name: &str, include_prefixes: &[String]) -> bool {
    // The writer already emitted a fresh manifest
    if entry_name == "META-INF/MANIFEST.MF" {
        return false;
    }
    // Keep other META-INF entries (services, licenses, etc.)
    if entry_name.starts_with("META-INF/") {
        return true;
    }
    if include_prefixes.is_empty() {
        return true;
    }
    include_prefixes.iter().any(|p| entry_name.starts_with(p))
}
