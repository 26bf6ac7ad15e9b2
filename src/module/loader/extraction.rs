//! Working directories for module archives
//!
//! Every module gets a private directory under the shared extraction root.
//! The archive is copied there before its code loader opens it, so a
//! re-deployed archive in the watched directory never changes the bytes a
//! running module is served from. Directories are never cleaned up while
//! the process runs.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::module::traits::ModuleError;

const PARTIAL_SUFFIX: &str = ".partial";

/// Create a fresh working directory named after the archive
///
/// `<root>/<archive-stem>-<uuid>`; the suffix keeps two deployments of the
/// same archive name apart.
pub fn create_working_dir(root: &Path, archive: &Path) -> Result<PathBuf, ModuleError> {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "module".to_string());
    let dir = root.join(format!("{}-{}", stem, uuid::Uuid::new_v4()));

    std::fs::create_dir_all(&dir).map_err(|e| {
        ModuleError::extraction(archive, format!("cannot create working directory {:?}: {}", dir, e))
    })?;
    debug!("Created working directory {:?} for {:?}", dir, archive);
    Ok(dir)
}

/// Copy the archive into its working directory, returning the staged path
///
/// The copy lands under a `.partial` name and is renamed into place, so the
/// staged path only ever holds a complete archive. Staging twice into the
/// same directory reuses the existing copy.
pub fn stage_archive(working_dir: &Path, archive: &Path) -> Result<PathBuf, ModuleError> {
    let file_name = archive
        .file_name()
        .ok_or_else(|| ModuleError::extraction(archive, "archive path has no file name"))?;
    let staged = working_dir.join(file_name);
    if staged.exists() {
        return Ok(staged);
    }

    let mut partial_name = file_name.to_os_string();
    partial_name.push(PARTIAL_SUFFIX);
    let partial = working_dir.join(partial_name);
    let copied = std::fs::copy(archive, &partial).and_then(|_| std::fs::rename(&partial, &staged));
    if let Err(e) = copied {
        let _ = std::fs::remove_file(&partial);
        return Err(ModuleError::extraction(archive, e));
    }
    debug!("Staged {:?} as {:?}", archive, staged);
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_working_dirs_are_unique_per_call() {
        let root = TempDir::new().unwrap();
        let archive = Path::new("/srv/modules/base.mod");
        let a = create_working_dir(root.path(), archive).unwrap();
        let b = create_working_dir(root.path(), archive).unwrap();

        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
        let name = a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("base-"));
    }

    #[test]
    fn test_stage_archive_copies_once() {
        let root = TempDir::new().unwrap();
        let archive = root.path().join("ext.mod");
        std::fs::write(&archive, b"v1").unwrap();
        let work = create_working_dir(&root.path().join("work"), &archive).unwrap();

        let staged = stage_archive(&work, &archive).unwrap();
        std::fs::write(&archive, b"v2").unwrap();
        let again = stage_archive(&work, &archive).unwrap();

        assert_eq!(staged, again);
        assert_eq!(std::fs::read(&staged).unwrap(), b"v1");
    }

    #[test]
    fn test_missing_archive_fails_extraction() {
        let root = TempDir::new().unwrap();
        let work = root.path().join("work");
        std::fs::create_dir(&work).unwrap();
        let err = stage_archive(&work, &root.path().join("ghost.mod")).unwrap_err();

        assert!(matches!(err, ModuleError::ExtractionFailed { .. }));
        assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0);
    }

    #[test]
    fn test_interrupted_copy_is_restaged() {
        let root = TempDir::new().unwrap();
        let archive = root.path().join("ext.mod");
        std::fs::write(&archive, b"complete archive").unwrap();
        let work = create_working_dir(&root.path().join("work"), &archive).unwrap();
        // Left behind by a copy that died halfway
        std::fs::write(work.join("ext.mod.partial"), b"complete").unwrap();

        let staged = stage_archive(&work, &archive).unwrap();

        assert_eq!(staged, work.join("ext.mod"));
        assert_eq!(std::fs::read(&staged).unwrap(), b"complete archive");
        assert!(!work.join("ext.mod.partial").exists());
    }
}
