//! # jar-indexer
//!
//! Decompile a JAR with Vineflower and index every class, field, and method
//! into a structured JSON inventory for downstream documentation phases.
//!
//! ## Architecture
//!
//! - **cli**: Command-line argument model
//! - **config**: Project-root and decompiler-engine resolution
//! - **filter**: Package-prefix filtering of the input archive
//! - **vineflower**: External decompiler invocation
//! - **walk**: Deterministic enumeration of decompiled source files
//! - **extract**: Structural extraction of type declarations via tree-sitter
//! - **index**: Class-index aggregation, hashing, and atomic persistence

pub mod cli;
pub mod config;
pub mod extract;
pub mod filter;
pub mod index;
pub mod vineflower;
pub mod walk;
