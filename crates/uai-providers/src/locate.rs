use std::path::{Path, PathBuf};

use tracing::debug;

/// Find a tool binary: common install directories first, then `$PATH`.
pub fn locate_binary(name: &str) -> Option<PathBuf> {
    let found = candidate_dirs()
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|path| is_executable(path))
        .or_else(|| which::which(name).ok());

    debug!(name, found = ?found, "Located tool binary");
    found
}

fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from("/usr/local/bin"), PathBuf::from("/usr/bin")];
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".local").join("bin"));
        dirs.push(home.join("bin"));
    }
    dirs
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locates_shell() {
        let sh = locate_binary("sh").expect("sh should exist on test hosts");
        assert!(sh.ends_with("sh"));
    }

    #[test]
    fn test_missing_binary_is_none() {
        assert!(locate_binary("uai-definitely-not-installed-7f3a").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tool");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        assert!(!is_executable(&path));
    }
}
