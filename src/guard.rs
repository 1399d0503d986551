//! Pre-flight check that refuses to clobber existing output files.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("The following files already exist: {}. Use --force to overwrite.", join_paths(.paths))]
    FilesExist { paths: Vec<PathBuf> },
}

pub fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The subset of `paths` that already exists, in argument order.
pub fn existing_outputs<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| p.exists())
        .map(Path::to_path_buf)
        .collect()
}

/// Returns the files that `force` allows to be overwritten, or an error when
/// something exists and `force` is off.
pub fn check_outputs<P: AsRef<Path>>(paths: &[P], force: bool) -> Result<Vec<PathBuf>, GuardError> {
    let existing = existing_outputs(paths);
    if existing.is_empty() || force {
        return Ok(existing);
    }
    Err(GuardError::FilesExist { paths: existing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn passes_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = [dir.path().join("a.bin"), dir.path().join("b.xml")];
        assert!(check_outputs(&outputs, false).unwrap().is_empty());
    }

    #[test]
    fn refuses_existing_files_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.xml");
        let c = dir.path().join("c.bin");
        fs::write(&a, b"x").unwrap();
        fs::write(&c, b"y").unwrap();

        let err = check_outputs(&[&a, &b, &c], false).unwrap_err();
        let GuardError::FilesExist { paths } = &err;
        assert_eq!(paths, &vec![a.clone(), c.clone()]);

        let msg = err.to_string();
        assert!(msg.starts_with("The following files already exist: "));
        assert!(msg.contains(&a.display().to_string()));
        assert!(msg.ends_with("Use --force to overwrite."));
    }

    #[test]
    fn force_returns_files_to_warn_about() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        fs::write(&a, b"x").unwrap();

        let existing = check_outputs(&[a.clone(), dir.path().join("b.bin")], true).unwrap();
        assert_eq!(existing, vec![a]);
    }
}
