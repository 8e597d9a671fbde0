//! # Depot Core
//!
//! A versioned artifact repository on top of an opaque blob store.
//!
//! Two kinds of artifacts are kept:
//!
//! - **Tools**: archives named `<prefix><major.minor.patch-platform><suffix>`.
//!   The name is the version record; the [`ToolCatalog`] lists and filters
//!   them and publishes one payload under several platform aliases.
//! - **Packages**: revisions fetched from a [`SourceRepository`], digested
//!   with SHA-256, uploaded once and recorded in a [`Registry`]. Publishing
//!   an already registered reference is a no-op.
//!
//! ## Example
//!
//! ```no_run
//! use depot_core::{Config, Depot, LocalRepository, PackageRef};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let depot = Depot::init("./my-depot", Config::default())?;
//!
//! // Tools for any 1.x release
//! match depot.catalog().list_matching(1, None) {
//!     Ok(tools) => {
//!         for tool in &tools {
//!             println!("{} {}", tool.version, tool.url);
//!         }
//!     }
//!     Err(depot_core::Error::NoArtifacts) => println!("depot has no tools yet"),
//!     Err(e) => return Err(e.into()),
//! }
//!
//! // Publish the latest revision of a package
//! let reference = PackageRef::parse("cs/mysql")?;
//! let record = depot
//!     .packages(LocalRepository::new("./packages"))
//!     .publish(&reference, false)?;
//! println!("{} sha256:{}", record.reference, record.digest);
//! # Ok(())
//! # }
//! ```

mod catalog;
mod config;
mod content;
mod depot;
mod digest;
mod error;
mod package;
mod pkgstore;
mod registry;
mod repository;
mod storage;
mod version;

pub use catalog::{ToolBuilder, ToolCatalog, ToolList, ToolNaming, ToolRecord};
pub use config::{Config, DEFAULT_TOOL_PREFIX, DEFAULT_TOOL_SUFFIX};
pub use content::{ArchiveContent, Bundler, ContentKind, DirContent, PackageContent};
pub use depot::Depot;
pub use digest::ContentDigest;
pub use error::{Error, Result};
pub use package::{LATEST_REVISION, PackageRef, quote};
pub use pkgstore::{PackageStore, blob_name};
pub use registry::{FileRegistry, MemoryRegistry, PackageRecord, Registry};
pub use repository::{LocalRepository, SourceRepository};
pub use storage::{BlobStore, DirStorage, MemoryStorage};
pub use version::{Binary, VersionNumber};
