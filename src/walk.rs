use anyhow::Result;
use ignore::WalkBuilder;
use log::debug;
use std::path::{Path, PathBuf};

/// Collect every `.java` file under `root`, sorted so traversal order is
/// stable across runs. A directory with no matches yields an empty list.
pub fn collect_java_files(root: &Path) -> Result<Vec<PathBuf>> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!("skipping unreadable path under {}: {err}", root.display());
                continue;
            }
        };
        if entry.file_type().is_some_and(|t| t.is_file())
            && entry.path().extension().is_some_and(|e| e == "java")
        {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}
