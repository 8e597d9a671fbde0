//! Content-addressed package publishing.
//!
//! Publishing resolves a reference to a concrete revision, returns the
//! registry's record if there already is one, and otherwise reads the
//! content once, digests it, uploads it under a name derived from the
//! reference and registers the result.
//!
//! Two concurrent publishes of the same unregistered reference may both
//! upload. That is accepted: the blob name and bytes are identical, and the
//! registry keeps a single record per reference.

use crate::content::{ContentKind, PackageContent};
use crate::digest::ContentDigest;
use crate::error::{Error, Result};
use crate::package::{PackageRef, quote};
use crate::registry::{PackageRecord, Registry};
use crate::repository::SourceRepository;
use crate::storage::BlobStore;
use tracing::{debug, info};

/// Blob name a package revision is stored under.
pub fn blob_name(reference: &PackageRef) -> String {
    quote(&reference.to_string())
}

/// Publishes packages from a source repository into a blob store.
#[derive(Debug)]
pub struct PackageStore<S, R, G> {
    storage: S,
    repository: R,
    registry: G,
}

impl<S, R, G> PackageStore<S, R, G>
where
    S: BlobStore,
    R: SourceRepository,
    G: Registry,
{
    pub fn new(storage: S, repository: R, registry: G) -> Self {
        Self {
            storage,
            repository,
            registry,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn registry(&self) -> &G {
        &self.registry
    }

    /// Publish a package, returning its registry record.
    ///
    /// With `upgrade` set, a directory package has its on-disk revision
    /// bumped first; other content fails with [`Error::UpgradeUnsupported`].
    pub fn publish(&self, reference: &PackageRef, upgrade: bool) -> Result<PackageRecord> {
        let mut reference = reference.clone();
        if reference.is_latest() {
            let revision = self
                .repository
                .latest(&reference)
                .map_err(|e| Error::repository("resolve", &reference, e))?;
            debug!("resolved {} to revision {}", reference, revision);
            reference = reference.with_revision(revision);
        }

        let mut content = self
            .repository
            .get(&reference)
            .map_err(|e| Error::repository("get", &reference, e))?;

        if upgrade {
            match content.kind() {
                ContentKind::Directory => {
                    let revision = content.revision().checked_add(1).ok_or_else(|| {
                        Error::repository(
                            "upgrade",
                            &reference,
                            Error::invalid_reference(
                                reference.to_string(),
                                "revision cannot be incremented",
                            ),
                        )
                    })?;
                    content
                        .set_disk_revision(revision)
                        .map_err(|e| Error::repository("upgrade", &reference, e))?;
                    reference = reference.with_revision(content.revision());
                    info!("upgraded {}", reference);
                }
                ContentKind::Archive => return Err(Error::upgrade_unsupported(&reference)),
            }
        }

        if let Some(record) = self
            .registry
            .lookup(&reference)
            .map_err(|e| Error::registry("look up", &reference, e))?
        {
            debug!("{} already published", reference);
            return Ok(record);
        }

        let mut buf = Vec::new();
        content
            .read_into(&mut buf)
            .map_err(|e| Error::repository("read", &reference, e))?;
        let digest = ContentDigest::of_bytes(&buf);
        let size = buf.len() as u64;

        let name = blob_name(&reference);
        info!("uploading {} ({} bytes, sha256 {})", name, size, digest);
        self.storage
            .put(&name, &mut buf.as_slice(), size)
            .map_err(|e| Error::storage("put", &name, e))?;
        let url = self
            .storage
            .url(&name)
            .map_err(|e| Error::storage("get URL of", &name, e))?;

        self.registry
            .register(&*content, &reference, &url, digest)
            .map_err(|e| Error::registry("register", &reference, e))
    }
}
