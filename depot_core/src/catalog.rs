//! Tool catalog: versioned tool archives in a blob store.
//!
//! A tool archive is stored under `<prefix><major.minor.patch-platform><suffix>`.
//! The name is the only record of the version, so the catalog is rebuilt
//! from a store listing on every read.

use crate::config::{Config, DEFAULT_TOOL_PREFIX, DEFAULT_TOOL_SUFFIX};
use crate::error::{Error, Result};
use crate::storage::BlobStore;
use crate::version::{Binary, VersionNumber};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::{debug, info};

/// Prefix and suffix that frame a version in an artifact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolNaming {
    prefix: String,
    suffix: String,
}

impl Default for ToolNaming {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_PREFIX)
    }
}

impl ToolNaming {
    /// Naming with the given prefix and the standard suffix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: DEFAULT_TOOL_SUFFIX.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            prefix: config.tool_prefix.clone(),
            suffix: config.tool_suffix.clone(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Artifact name for a version.
    pub fn name_for(&self, version: &Binary) -> String {
        format!("{}{}{}", self.prefix, version.encode(), self.suffix)
    }

    /// Version encoded in an artifact name, if it is a well-formed tool name.
    pub fn version_of(&self, name: &str) -> Option<Binary> {
        let middle = name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        Binary::decode(middle).ok()
    }
}

/// A tool archive found in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolRecord {
    pub version: Binary,
    pub url: String,
}

/// A non-empty list of tool records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ToolList(Vec<ToolRecord>);

impl ToolList {
    pub fn records(&self) -> &[ToolRecord] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ToolRecord> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<ToolRecord> {
        self.0
    }

    /// Records sharing the highest version number.
    pub fn newest(&self) -> ToolList {
        let Some(best) = self.0.iter().map(|t| t.version.number()).max() else {
            return self.clone();
        };
        ToolList(
            self.0
                .iter()
                .filter(|t| t.version.number() == best)
                .cloned()
                .collect(),
        )
    }

    /// Distinct platforms in the list, sorted.
    pub fn platforms(&self) -> Vec<&str> {
        self.0
            .iter()
            .map(|t| t.version.platform.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Records built for `platform`, or `None` if there are none.
    pub fn for_platform(&self, platform: &str) -> Option<ToolList> {
        let records: Vec<_> = self
            .0
            .iter()
            .filter(|t| t.version.platform == platform)
            .cloned()
            .collect();
        (!records.is_empty()).then_some(ToolList(records))
    }
}

impl IntoIterator for ToolList {
    type Item = ToolRecord;
    type IntoIter = std::vec::IntoIter<ToolRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ToolList {
    type Item = &'a ToolRecord;
    type IntoIter = std::slice::Iter<'a, ToolRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Produces finished tool archives.
pub trait ToolBuilder {
    /// Write a complete archive to `out` and report the version it carries.
    fn build(&self, out: &mut dyn Write) -> Result<Binary>;
}

/// Lists and publishes tool archives in a blob store.
#[derive(Debug)]
pub struct ToolCatalog<S> {
    storage: S,
    naming: ToolNaming,
}

impl<S: BlobStore> ToolCatalog<S> {
    /// Catalog using the default name prefix.
    pub fn new(storage: S) -> Self {
        Self::with_naming(storage, ToolNaming::default())
    }

    /// Catalog using a startup-time naming override.
    pub fn with_naming(storage: S, naming: ToolNaming) -> Self {
        Self { storage, naming }
    }

    pub fn naming(&self) -> &ToolNaming {
        &self.naming
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Name a version is stored under.
    pub fn storage_name(&self, version: &Binary) -> String {
        self.naming.name_for(version)
    }

    /// Tools with the given major version and, if `minor` is set, minor version.
    ///
    /// Fails with [`Error::NoArtifacts`] if the store holds no tool archives
    /// at all, and with [`Error::NoMatchingVersion`] if it holds some but none
    /// pass the filter. Names that do not decode are skipped.
    pub fn list_matching(&self, major: u32, minor: Option<u32>) -> Result<ToolList> {
        debug!(
            "reading v{}.{} tools",
            major,
            minor.map_or_else(|| "*".to_string(), |m| m.to_string())
        );
        let prefix = self.naming.prefix();
        let names = self
            .storage
            .list(prefix)
            .map_err(|e| Error::storage("list", prefix, e))?;

        let decoded: Vec<(String, Binary)> = names
            .into_iter()
            .filter_map(|name| self.naming.version_of(&name).map(|v| (name, v)))
            .collect();
        let found_any = !decoded.is_empty();

        let mut list = Vec::new();
        for (name, version) in decoded {
            if version.major() != major {
                continue;
            }
            if minor.is_some_and(|m| version.minor() != m) {
                continue;
            }
            debug!("found {}", version);
            let url = self
                .storage
                .url(&name)
                .map_err(|e| Error::storage("get URL of", &name, e))?;
            list.push(ToolRecord { version, url });
        }

        if list.is_empty() {
            if found_any {
                return Err(Error::no_matching_version(major, minor));
            }
            return Err(Error::NoArtifacts);
        }
        Ok(ToolList(list))
    }

    /// Upload one archive under `primary` and under one alias per extra platform.
    ///
    /// `size` must be the exact length of `content`. Aliases are uploaded
    /// first, in order, then the primary; the cursor is rewound before each
    /// upload. The first failing upload aborts the call, and blobs already
    /// written for earlier names are left in place.
    pub fn publish<R: Read + Seek>(
        &self,
        content: &mut R,
        size: u64,
        primary: &Binary,
        alias_platforms: &[&str],
    ) -> Result<ToolRecord> {
        debug!("uploading tools for {:?}", alias_platforms);

        // Resolve every alias before the first write.
        let aliases = self.alias_versions(primary, alias_platforms)?;

        for alias in &aliases {
            self.put_tools(content, size, alias)?;
        }
        let name = self.put_tools(content, size, primary)?;

        let url = self
            .storage
            .url(&name)
            .map_err(|e| Error::storage("get URL of", &name, e))?;
        Ok(ToolRecord {
            version: primary.clone(),
            url,
        })
    }

    /// Versions [`publish`](Self::publish) uploads as aliases of `primary`.
    ///
    /// The primary platform and repeated platforms are dropped; order is kept.
    pub fn alias_versions(&self, primary: &Binary, alias_platforms: &[&str]) -> Result<Vec<Binary>> {
        let mut aliases: Vec<Binary> = Vec::new();
        for platform in alias_platforms {
            if *platform == primary.platform || aliases.iter().any(|a| a.platform == *platform) {
                continue;
            }
            aliases.push(primary.with_platform(*platform)?);
        }
        Ok(aliases)
    }

    /// Build an archive into a temporary file, then publish it.
    ///
    /// The archive is complete before any upload starts, so a failing build
    /// leaves the store untouched. `force_version` replaces the built
    /// version number.
    pub fn publish_built<B: ToolBuilder + ?Sized>(
        &self,
        builder: &B,
        force_version: Option<VersionNumber>,
        alias_platforms: &[&str],
    ) -> Result<ToolRecord> {
        let mut file = tempfile::tempfile()?;
        let built = builder.build(&mut file)?;
        file.flush()?;
        let size = file.metadata()?.len();

        let version = match force_version {
            Some(number) => Binary::new(number, built.platform)?,
            None => built,
        };
        info!("built {} ({}kB)", version, (size + 512) / 1024);

        self.publish(&mut file, size, &version, alias_platforms)
    }

    fn put_tools<R: Read + Seek>(&self, content: &mut R, size: u64, version: &Binary) -> Result<String> {
        content.seek(SeekFrom::Start(0))?;
        let name = self.naming.name_for(version);
        info!("uploading {}", version);
        self.storage
            .put(&name, content, size)
            .map_err(|e| Error::storage("put", &name, e))?;
        Ok(name)
    }
}
