use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use crate::filter::filter_jar;

fn java_command(args: &[&str]) -> Result<std::process::ExitStatus> {
    let java_bin = std::env::var("JAR_INDEXER_JAVA").unwrap_or_else(|_| "java".to_string());

    #[cfg(windows)]
    {
        let lower = java_bin.to_ascii_lowercase();
        if lower.ends_with(".cmd") || lower.ends_with(".bat") {
            return Command::new("cmd")
                .arg("/C")
                .arg(&java_bin)
                .args(args)
                .status()
                .context("Failed to execute java (ensure JRE/JDK is installed)");
        }
    }

    Command::new(&java_bin)
        .args(args)
        .status()
        .context("Failed to execute java (ensure JRE/JDK is installed)")
}

#[derive(Debug, Clone, Copy)]
pub struct DecompileSummary {
    pub filtered_entries: u64,
    pub elapsed: Duration,
}

/// Source reconstruction capability. The pipeline depends on this trait, not
/// on the Vineflower binary, so tests can substitute a stub engine.
pub trait Decompiler {
    fn decompile(
        &self,
        jar_path: &Path,
        output_dir: &Path,
        include_prefixes: &[String],
    ) -> Result<DecompileSummary>;
}

#[derive(Debug, Clone)]
pub struct Vineflower {
    engine_jar: PathBuf,
}

impl Vineflower {
    pub fn new(engine_jar: PathBuf) -> Self {
        Self { engine_jar }
    }
}

impl Decompiler for Vineflower {
    /// Decompile `jar_path` into `output_dir`, one `.java` file per top-level
    /// type. Only entries matching `include_prefixes` reach the engine; the
    /// filtered jar is a temp file removed on every exit path. Per-class
    /// failures are the engine's own to report and skip; only a failed
    /// engine invocation is an error here.
    fn decompile(
        &self,
        jar_path: &Path,
        output_dir: &Path,
        include_prefixes: &[String],
    ) -> Result<DecompileSummary> {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create decompile directory: {}", output_dir.display())
        })?;

        let filtered = tempfile::Builder::new()
            .prefix("jar-indexer-filtered-")
            .suffix(".jar")
            .tempfile()
            .context("Failed to create temp file for the filtered jar")?;

        let filtered_entries = filter_jar(jar_path, filtered.path(), include_prefixes)?;
        println!("Input JAR: {}", jar_path.display());
        if include_prefixes.is_empty() {
            println!("Filtered to {filtered_entries} entries (no package filter)");
        } else {
            println!(
                "Filtered to {filtered_entries} entries (packages: {})",
                include_prefixes.join(", ")
            );
        }
        println!("Output:    {}", output_dir.display());

        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .to_string();
        let thread_arg = format!("-thr={threads}");

        // Vineflower CLI arguments:
        //   -dgs=1  : decompile generic signatures
        //   -asc=1  : allow synthetic class access (for inner classes)
        //   -rsy=1  : remove synthetic methods/fields
        //   -ind=   : use spaces for indentation
        //   -log=WARN : only show warnings and errors
        //   -thr=N  : use available processors for parallel decompilation
        let args = [
            "-jar",
            self.engine_jar
                .to_str()
                .context("vineflower.jar path is not valid UTF-8")?,
            "-dgs=1",
            "-asc=1",
            "-rsy=1",
            "-ind=    ",
            "-log=WARN",
            thread_arg.as_str(),
            filtered
                .path()
                .to_str()
                .context("filtered jar path is not valid UTF-8")?,
            output_dir
                .to_str()
                .context("output directory path is not valid UTF-8")?,
        ];

        println!("Starting Vineflower with {threads} threads...");
        let start = Instant::now();

        let status = java_command(&args)?;
        if !status.success() {
            bail!(
                "Vineflower decompilation failed (exit code {})",
                status
                    .code()
                    .map_or_else(|| "unknown".to_string(), |c| c.to_string())
            );
        }

        let elapsed = start.elapsed();
        println!("Decompilation completed in {:.1} seconds", elapsed.as_secs_f64());

        Ok(DecompileSummary {
            filtered_entries,
            elapsed,
        })
    }
}
