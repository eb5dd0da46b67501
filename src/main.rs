use clap::Parser;
use clap::error::ErrorKind;
use jar_indexer::cli::Cli;
use jar_indexer::config::{resolve_project_root, resolve_vineflower_path};
use jar_indexer::index::{index_sources, jar_sha256};
use jar_indexer::vineflower::{Decompiler, Vineflower};
use std::path::Path;

const EXIT_USAGE: i32 = 1;
const EXIT_FATAL: i32 = 2;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EXIT_USAGE,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    if let Err(message) = validate_jar_path(&cli.jar) {
        eprintln!("ERROR: {message}");
        eprintln!("Usage: jar-indexer <path-to-jar> [--root DIR] [--include PREFIX]...");
        std::process::exit(EXIT_USAGE);
    }

    if let Err(err) = run(&cli) {
        eprintln!("FATAL: {err:#}");
        std::process::exit(EXIT_FATAL);
    }
}

fn validate_jar_path(jar: &Path) -> Result<(), String> {
    if !jar.is_file() {
        return Err(format!("File not found: {}", jar.display()));
    }
    if jar.extension().is_none_or(|ext| ext != "jar") {
        return Err(format!("Expected a .jar file, got: {}", jar.display()));
    }
    Ok(())
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let root = resolve_project_root(cli)?;
    let decompiled_dir = root.join("decompiled");
    let index_path = root.join("class-index.json");

    // Hash before any stage touches the filesystem, so the recorded digest
    // is a pure function of the input archive
    let jar_hash = jar_sha256(&cli.jar)?;
    println!("JAR SHA-256: {jar_hash}");

    println!();
    println!("=== Phase 1a: Decompiling JAR with Vineflower ===");
    let engine = Vineflower::new(resolve_vineflower_path(cli)?);
    engine.decompile(&cli.jar, &decompiled_dir, &cli.include)?;

    println!();
    println!("=== Phase 1b: Parsing decompiled source ===");
    index_sources(&decompiled_dir, &index_path, &jar_hash)?;

    println!();
    println!("=== Indexing complete ===");
    println!("  Decompiled source: {}", decompiled_dir.display());
    println!("  Class index:       {}", index_path.display());

    Ok(())
}
