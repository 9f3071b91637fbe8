//! # Bundle - Stylesheet metadata, caching and cross-file resolution
//!
//! ```text
//! FileSystem ──► FileProcessor ──► Metadata (Rc, cached per fingerprint)
//!                      ▲                  │
//!                      └──── Resolver ◄───┘  (import chains, memoized per pass)
//! ```
//!
//! The [`FileProcessor`] turns a path into [`Metadata`] (symbol table, import
//! records, namespace) and caches it until the file's [`Fingerprint`]
//! changes. The [`Resolver`] follows import records from one file's metadata
//! to the definition of a symbol, reporting unresolved references into a
//! caller-owned [`Diagnostics`] sink.
//!
//! [`Fingerprint`]: stylescope_common::Fingerprint
//! [`Diagnostics`]: stylescope_common::Diagnostics

pub mod file_processor;
pub mod graph;
pub mod metadata;
pub mod namespace;
pub mod path_resolver;
pub mod processor;
pub mod resolver;

pub use file_processor::*;
pub use graph::*;
pub use metadata::*;
pub use namespace::*;
pub use path_resolver::*;
pub use processor::*;
pub use resolver::*;

pub use stylescope_common::{FileSystem, MemoryFileSystem, RealFileSystem};
