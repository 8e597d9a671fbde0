//! On-disk depot workspace.

use crate::catalog::{ToolCatalog, ToolNaming};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pkgstore::PackageStore;
use crate::registry::FileRegistry;
use crate::repository::SourceRepository;
use crate::storage::DirStorage;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config";
const BLOBS_DIR: &str = "blobs";
const REGISTRY_DIR: &str = "registry";

/// A depot rooted at a directory.
#[derive(Debug)]
pub struct Depot {
    root: PathBuf,
    config: Config,
    storage: DirStorage,
    registry: FileRegistry,
}

impl Depot {
    /// Initialize a new depot at the given path.
    ///
    /// Creates the directory structure:
    /// - `blobs/` for stored artifacts
    /// - `registry/` for package records
    /// - `config` file with version and tool naming
    pub fn init<P: AsRef<Path>>(root: P, config: Config) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let config_path = root.join(CONFIG_FILE);
        fs::write(&config_path, config.render())?;

        let storage = DirStorage::open(root.join(BLOBS_DIR))?;
        let registry = FileRegistry::open(root.join(REGISTRY_DIR))?;

        Ok(Self {
            root,
            config,
            storage,
            registry,
        })
    }

    /// Open an existing depot at the given path.
    ///
    /// Validates the directory structure and reads the configuration.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            return Err(Error::invalid_config(&root, "directory does not exist"));
        }

        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(Error::invalid_config(&root, "config file not found"));
        }
        let config = Config::parse(&config_path, &fs::read_to_string(&config_path)?)?;

        for dir in [BLOBS_DIR, REGISTRY_DIR] {
            if !root.join(dir).is_dir() {
                return Err(Error::invalid_config(
                    &root,
                    format!("{} directory missing", dir),
                ));
            }
        }

        let storage = DirStorage::open(root.join(BLOBS_DIR))?;
        let registry = FileRegistry::open(root.join(REGISTRY_DIR))?;

        Ok(Self {
            root,
            config,
            storage,
            registry,
        })
    }

    /// Get the root directory of the depot.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &DirStorage {
        &self.storage
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    /// Tool catalog using the configured naming.
    pub fn catalog(&self) -> ToolCatalog<&DirStorage> {
        self.catalog_with_prefix(None)
    }

    /// Tool catalog, optionally overriding the configured prefix.
    pub fn catalog_with_prefix(&self, prefix: Option<&str>) -> ToolCatalog<&DirStorage> {
        let config = match prefix {
            Some(prefix) => self.config.clone().with_tool_prefix(prefix),
            None => self.config.clone(),
        };
        ToolCatalog::with_naming(&self.storage, ToolNaming::from_config(&config))
    }

    /// Package store publishing from `repository` into this depot.
    pub fn packages<R: SourceRepository>(
        &self,
        repository: R,
    ) -> PackageStore<&DirStorage, R, &FileRegistry> {
        PackageStore::new(&self.storage, repository, &self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{PackageRef, quote};
    use crate::repository::LocalRepository;
    use crate::version::Binary;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let depot = Depot::init(temp_dir.path().join("depot"), Config::default()).unwrap();

        assert!(depot.root().join("config").is_file());
        assert!(depot.root().join("blobs").is_dir());
        assert!(depot.root().join("registry").is_dir());
    }

    #[test]
    fn test_open_reads_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::default().with_tool_prefix("dev/tools-");
        Depot::init(temp_dir.path(), config.clone()).unwrap();

        let depot = Depot::open(temp_dir.path()).unwrap();
        assert_eq!(depot.config(), &config);
    }

    #[test]
    fn test_open_missing() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            Depot::open(temp_dir.path().join("nope")),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(Depot::open(temp_dir.path()).is_err());
    }

    #[test]
    fn test_open_missing_subdir() {
        let temp_dir = TempDir::new().unwrap();
        Depot::init(temp_dir.path(), Config::default()).unwrap();
        fs::remove_dir(temp_dir.path().join("registry")).unwrap();
        assert!(Depot::open(temp_dir.path()).is_err());
    }

    #[test]
    fn test_prefix_override_does_not_rename() {
        let temp_dir = TempDir::new().unwrap();
        let depot = Depot::init(temp_dir.path(), Config::default()).unwrap();

        let v = Binary::decode("1.0.0-x").unwrap();
        depot
            .catalog()
            .publish(&mut Cursor::new(b"t".to_vec()), 1, &v, &[])
            .unwrap();

        assert_eq!(depot.catalog().list_matching(1, None).unwrap().len(), 1);
        assert!(matches!(
            depot
                .catalog_with_prefix(Some("dev/tools-"))
                .list_matching(1, None),
            Err(Error::NoArtifacts)
        ));
    }

    #[test]
    fn test_packages_publish_into_depot() {
        let temp_dir = TempDir::new().unwrap();
        let depot = Depot::init(temp_dir.path().join("depot"), Config::default()).unwrap();

        let repo_root = temp_dir.path().join("repo");
        fs::create_dir_all(repo_root.join(quote("cs"))).unwrap();
        fs::write(repo_root.join(quote("cs")).join("mysql-1.pkg"), b"m").unwrap();

        let reference = PackageRef::parse("cs/mysql").unwrap();
        let record = depot
            .packages(LocalRepository::new(&repo_root))
            .publish(&reference, false)
            .unwrap();

        assert_eq!(depot.registry().list().unwrap(), vec![record]);
    }
}
