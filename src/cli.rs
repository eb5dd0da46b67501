use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "jar-indexer")]
#[command(about = "Decompile a JAR and index every class into a structured JSON inventory")]
pub struct Cli {
    #[arg(value_name = "JAR")]
    pub jar: PathBuf,

    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[arg(long = "include", value_name = "PREFIX")]
    pub include: Vec<String>,

    #[arg(long, value_name = "FILE")]
    pub vineflower: Option<PathBuf>,
}
