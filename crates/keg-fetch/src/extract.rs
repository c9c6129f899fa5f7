//! Unpacking downloaded sources.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    TarGz,
    Tar,
    /// Anything else is placed in the build directory untouched.
    Plain,
}

fn archive_kind(path: &Path) -> ArchiveKind {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        ArchiveKind::TarGz
    } else if name.ends_with(".tar") {
        ArchiveKind::Tar
    } else {
        ArchiveKind::Plain
    }
}

/// Unpacks `archive` into `dest` and returns the source root.
///
/// When the archive holds a single top-level directory (as GitHub release
/// tarballs do), the source root is that directory. Files that are not
/// tarballs are copied into `dest` under their own name.
///
/// The cache file name carries a `<name>--<version>--` prefix; only the
/// suffix decides the archive kind.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<PathBuf, FetchError> {
    std::fs::create_dir_all(dest).map_err(FetchError::io(dest))?;
    match archive_kind(archive) {
        ArchiveKind::TarGz => {
            let file = File::open(archive).map_err(FetchError::io(archive))?;
            unpack(GzDecoder::new(BufReader::new(file)), archive, dest)?;
        }
        ArchiveKind::Tar => {
            let file = File::open(archive).map_err(FetchError::io(archive))?;
            unpack(BufReader::new(file), archive, dest)?;
        }
        ArchiveKind::Plain => {
            let name = original_file_name(archive);
            std::fs::copy(archive, dest.join(&name)).map_err(FetchError::io(archive))?;
            return Ok(dest.to_path_buf());
        }
    }
    source_root(dest)
}

fn unpack<R: Read>(reader: R, archive: &Path, dest: &Path) -> Result<(), FetchError> {
    let mut tar = tar::Archive::new(reader);
    tar.set_preserve_permissions(true);
    tar.unpack(dest).map_err(FetchError::io(archive))?;
    tracing::debug!(archive = %archive.display(), dest = %dest.display(), "unpacked");
    Ok(())
}

/// `dest`, or its only entry if that is a directory.
fn source_root(dest: &Path) -> Result<PathBuf, FetchError> {
    let mut entries = std::fs::read_dir(dest)
        .map_err(FetchError::io(dest))?
        .filter_map(Result::ok);
    match (entries.next(), entries.next()) {
        (Some(only), None) if only.path().is_dir() => Ok(only.path()),
        _ => Ok(dest.to_path_buf()),
    }
}

/// The file name without the cache's `<name>--<version>--` prefix.
fn original_file_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());
    match name.splitn(3, "--").nth(2) {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use pretty_assertions::assert_eq;

    fn write_tarball(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, body) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn kinds_by_suffix() {
        assert_eq!(archive_kind(Path::new("m--0.8--v0.8.tar.gz")), ArchiveKind::TarGz);
        assert_eq!(archive_kind(Path::new("x.TGZ")), ArchiveKind::TarGz);
        assert_eq!(archive_kind(Path::new("x.tar")), ArchiveKind::Tar);
        assert_eq!(archive_kind(Path::new("x.zip")), ArchiveKind::Plain);
    }

    #[test]
    fn strips_single_top_level_directory() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("mattext--0.8--v0.8.tar.gz");
        write_tarball(
            &archive,
            &[
                ("mattext-0.8/CMakeLists.txt", "project(mattext)\n"),
                ("mattext-0.8/src/main.cpp", "int main() {}\n"),
            ],
        );
        let dest = dir.path().join("build");
        let root = extract_archive(&archive, &dest).unwrap();
        assert_eq!(root, dest.join("mattext-0.8"));
        assert!(root.join("src/main.cpp").is_file());
    }

    #[test]
    fn flat_archive_root_is_dest() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("flat.tgz");
        write_tarball(&archive, &[("Makefile", "all:\n"), ("README", "hi\n")]);
        let dest = dir.path().join("build");
        assert_eq!(extract_archive(&archive, &dest).unwrap(), dest);
        assert!(dest.join("Makefile").is_file());
    }

    #[test]
    fn plain_file_copied_under_original_name() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tool--1.0--install.sh");
        std::fs::write(&src, "#!/bin/sh\n").unwrap();
        let dest = dir.path().join("build");
        let root = extract_archive(&src, &dest).unwrap();
        assert_eq!(root, dest);
        assert!(dest.join("install.sh").is_file());
    }

    #[test]
    fn corrupt_tarball_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bad.tar.gz");
        std::fs::write(&archive, "not gzip").unwrap();
        let err = extract_archive(&archive, &dir.path().join("build")).unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }
}
