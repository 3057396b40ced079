//! Resource path resolution: `AVS_RESOURCE_DIR` roots before the working
//! directory.

use std::path::{Path, PathBuf};

/// Search roots: every `AVS_RESOURCE_DIR` entry (colon-separated), then the
/// current directory.
pub fn search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(value) = std::env::var("AVS_RESOURCE_DIR") {
        for entry in value.split(':') {
            if !entry.is_empty() {
                roots.push(PathBuf::from(entry));
            }
        }
    }
    roots.push(PathBuf::from("."));
    roots
}

/// Resolve a relative resource name against the search roots. Absolute
/// paths pass through when they exist; a miss returns `None` and the
/// consuming effect degrades to its documented default.
pub fn resolve(name: &str) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.is_absolute() {
        return direct.exists().then(|| direct.to_path_buf());
    }
    for root in search_roots() {
        let candidate = root.join(name);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_from_env_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("palette.map");
        let mut handle = std::fs::File::create(&file).unwrap();
        writeln!(handle, "000000 ffffff").unwrap();

        // SAFETY: single-threaded test; no other thread reads the
        // environment concurrently.
        unsafe {
            std::env::set_var("AVS_RESOURCE_DIR", dir.path());
        }
        let resolved = resolve("palette.map");
        // SAFETY: same as above.
        unsafe {
            std::env::remove_var("AVS_RESOURCE_DIR");
        }
        assert_eq!(resolved, Some(file));
    }

    #[test]
    fn missing_resource_returns_none() {
        assert!(resolve("no/such/resource.bin").is_none());
    }
}
