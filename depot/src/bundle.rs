//! Bundling of unpacked package directories.

use depot_core::{Bundler, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File, Metadata};
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

/// Packs a package directory into a gzip-compressed tar archive.
///
/// Entries are sorted by name and carry zeroed owners and timestamps, so an
/// unchanged directory always bundles to the same bytes (and digest).
/// Symlinks and other special files are left out.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarBundler;

impl Bundler for TarBundler {
    fn bundle(&self, dir: &Path, out: &mut dyn Write) -> Result<u64> {
        let mut counter = CountingWriter {
            inner: out,
            written: 0,
        };

        let mut builder = tar::Builder::new(GzEncoder::new(&mut counter, Compression::default()));
        builder.follow_symlinks(false);

        let walker = ignore::WalkBuilder::new(dir)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = entry?;
            let path = entry.path();
            let Ok(rel) = path.strip_prefix(dir) else {
                continue;
            };
            if rel.as_os_str().is_empty() {
                continue;
            }

            let metadata = fs::symlink_metadata(path)?;
            let mut header = tar::Header::new_gnu();
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);
            if metadata.is_dir() {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, rel, io::empty())?;
            } else if metadata.is_file() {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(file_mode(&metadata));
                header.set_size(metadata.len());
                builder.append_data(&mut header, rel, File::open(path)?)?;
            } else {
                debug!("skipping {} while bundling", path.display());
            }
        }

        builder.into_inner()?.finish()?;
        Ok(counter.written)
    }
}

#[cfg(unix)]
fn file_mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &Metadata) -> u32 {
    0o644
}

struct CountingWriter<'a> {
    inner: &'a mut dyn Write,
    written: u64,
}

impl Write for CountingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn package_dir(temp_dir: &TempDir) -> std::path::PathBuf {
        let dir = temp_dir.path().join("mysql");
        fs::create_dir_all(dir.join("hooks")).unwrap();
        fs::write(dir.join("revision"), "5\n").unwrap();
        fs::write(dir.join("metadata.yaml"), "name: mysql\n").unwrap();
        fs::write(dir.join("hooks").join("install"), "#!/bin/sh\n").unwrap();
        dir
    }

    #[test]
    fn test_bundle_contains_sorted_entries() {
        let temp_dir = TempDir::new().unwrap();
        let dir = package_dir(&temp_dir);

        let mut buf = Vec::new();
        let n = TarBundler.bundle(&dir, &mut buf).unwrap();
        assert_eq!(n, buf.len() as u64);

        let mut archive = tar::Archive::new(GzDecoder::new(&buf[..]));
        let mut names = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry
                .path()
                .unwrap()
                .to_string_lossy()
                .trim_end_matches('/')
                .to_string();
            if name == "revision" {
                let mut content = String::new();
                entry.read_to_string(&mut content).unwrap();
                assert_eq!(content, "5\n");
            }
            names.push(name);
        }
        assert_eq!(
            names,
            vec!["hooks", "hooks/install", "metadata.yaml", "revision"]
        );
    }

    #[test]
    fn test_bundle_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let dir = package_dir(&temp_dir);

        let mut first = Vec::new();
        TarBundler.bundle(&dir, &mut first).unwrap();
        let mut second = Vec::new();
        TarBundler.bundle(&dir, &mut second).unwrap();
        assert_eq!(first, second);

        fs::write(dir.join("revision"), "6\n").unwrap();
        let mut changed = Vec::new();
        TarBundler.bundle(&dir, &mut changed).unwrap();
        assert_ne!(first, changed);
    }
}
