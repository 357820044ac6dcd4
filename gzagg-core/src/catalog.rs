use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::domain::FileDescriptor;
use crate::error::{AggError, Result};

/// Estimate the payload size of a compressed file. Files smaller than the header
/// constant clamp to zero instead of going negative.
pub fn estimate_size(on_disk: u64, avg_header_size: i64) -> u64 {
    let on_disk = i64::try_from(on_disk).unwrap_or(i64::MAX);
    on_disk.saturating_sub(avg_header_size).max(0) as u64
}

/// Recursively enumerate files under `root` whose name ends with `suffix`.
///
/// Entries are visited in file-name order so repeated runs see the same sequence.
/// A file whose base name was already cataloged elsewhere in the tree is skipped.
/// Any unreadable directory aborts the whole walk.
pub fn catalog(root: &Path, suffix: &str, avg_header_size: i64) -> Result<Vec<FileDescriptor>> {
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for e in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
    {
        let e = e.map_err(|source| AggError::Catalog {
            path: root.to_path_buf(),
            source,
        })?;
        if !e.file_type().is_file() {
            continue;
        }
        let name = e.file_name().to_string_lossy().into_owned();
        if !name.ends_with(suffix) {
            continue;
        }
        if !seen_names.insert(name) {
            debug!(path = %e.path().display(), "skipping already cataloged file name");
            continue;
        }
        let md = e.metadata().map_err(|source| AggError::Catalog {
            path: e.path().to_path_buf(),
            source,
        })?;
        out.push(FileDescriptor {
            path: e.into_path(),
            estimated_size: estimate_size(md.len(), avg_header_size),
        });
    }

    info!(root = %root.display(), files = out.len(), "catalog complete");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn estimate_clamps_at_zero() {
        assert_eq!(estimate_size(100, 20), 80);
        assert_eq!(estimate_size(20, 20), 0);
        assert_eq!(estimate_size(5, 20), 0);
        assert_eq!(estimate_size(5, -3), 8);
    }

    #[test]
    fn recurses_and_filters_by_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("2024/01")).unwrap();
        fs::write(root.join("a.gz"), vec![0u8; 50]).unwrap();
        fs::write(root.join("notes.txt"), b"skip").unwrap();
        fs::write(root.join("2024/01/b.gz"), vec![0u8; 120]).unwrap();
        fs::write(root.join("2024/c.gz.partial"), b"skip").unwrap();

        let files = catalog(root, ".gz", 20).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file_name()).collect();
        assert_eq!(files.len(), 2);
        assert!(names.contains(&"a.gz".to_string()));
        assert!(names.contains(&"b.gz".to_string()));
        let b = files.iter().find(|f| f.file_name() == "b.gz").unwrap();
        assert_eq!(b.estimated_size, 100);
    }

    #[test]
    fn duplicate_base_names_are_cataloged_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("x")).unwrap();
        fs::create_dir_all(root.join("y")).unwrap();
        fs::write(root.join("x/same.gz"), b"one").unwrap();
        fs::write(root.join("y/same.gz"), b"two").unwrap();

        let files = catalog(root, ".gz", 0).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.starts_with(root.join("x")));
    }

    #[test]
    fn missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = catalog(&dir.path().join("absent"), ".gz", 0).unwrap_err();
        assert!(matches!(err, AggError::Catalog { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_aborts_the_walk() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.gz"), b"ok").unwrap();
        let locked = root.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("b.gz"), b"hidden").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through the mode bits; nothing to check then.
        let readable = fs::read_dir(&locked).is_ok();
        let res = catalog(root, ".gz", 0);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            return;
        }
        assert!(matches!(res, Err(AggError::Catalog { .. })));
    }

    #[test]
    fn empty_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(catalog(dir.path(), ".gz", 0).unwrap().is_empty());
    }
}
