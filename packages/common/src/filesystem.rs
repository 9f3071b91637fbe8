use crate::result::CommonResult;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, UNIX_EPOCH};
use stylescope_parser::{parse_with_path, Stylesheet};

/// Modification marker of a file's content.
///
/// Two reads with the same fingerprint are assumed to return the same text;
/// what the number means (timestamp, version counter, hash) is up to the
/// file system that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

/// File content source used for import resolution and processing
pub trait FileSystem {
    /// Check if a file exists
    fn exists(&self, path: &Path) -> bool;

    /// Current modification marker of a file
    fn fingerprint(&self, path: &Path) -> io::Result<Fingerprint>;

    /// Read a file as UTF-8 text
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Real file system implementation (fingerprint = mtime in nanoseconds)
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn fingerprint(&self, path: &Path) -> io::Result<Fingerprint> {
        let modified = std::fs::metadata(path)?.modified()?;
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(saturating_nanos)
            .unwrap_or_default();
        Ok(Fingerprint(nanos))
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Nanoseconds of `duration`, saturating at `u64::MAX`
fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone)]
struct MemoryFile {
    content: String,
    version: u64,
}

/// In-memory file system for tests and embedding.
///
/// Clones share the same storage, so a test can keep a handle and edit files
/// after handing a clone to a processor. Every write bumps the version used
/// as fingerprint.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Rc<RefCell<HashMap<PathBuf, MemoryFile>>>,
    next_version: Rc<Cell<u64>>,
    reads: Rc<Cell<usize>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(path, content)` pairs
    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let fs = Self::new();
        for (path, content) in files {
            fs.write(path, content);
        }
        fs
    }

    pub fn write(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let version = self.next_version.get() + 1;
        self.next_version.set(version);
        self.files.borrow_mut().insert(
            normalize_path(path.as_ref()),
            MemoryFile {
                content: content.into(),
                version,
            },
        );
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        self.files.borrow_mut().remove(&normalize_path(path.as_ref()));
    }

    /// Number of content reads served so far
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(&normalize_path(path))
    }

    fn fingerprint(&self, path: &Path) -> io::Result<Fingerprint> {
        self.files
            .borrow()
            .get(&normalize_path(path))
            .map(|file| Fingerprint(file.version))
            .ok_or_else(|| Self::not_found(path))
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.reads.set(self.reads.get() + 1);
        self.files
            .borrow()
            .get(&normalize_path(path))
            .map(|file| file.content.clone())
            .ok_or_else(|| Self::not_found(path))
    }
}

/// Lexically normalize a path: drop `.` segments and fold `..` into the
/// preceding segment. Symlinks are not consulted.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Read and parse a stylesheet, returning the parsed tree and its source text
pub fn load_stylesheet(fs: &dyn FileSystem, path: &Path) -> CommonResult<(Stylesheet, String)> {
    let source = fs.read_to_string(path)?;
    let sheet = parse_with_path(&source, &path.to_string_lossy())?;
    Ok((sheet, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommonError;

    #[test]
    fn test_mtime_nanos_saturate() {
        assert_eq!(saturating_nanos(Duration::from_nanos(42)), 42);
        assert_eq!(saturating_nanos(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./d.st.css")),
            PathBuf::from("/a/c/d.st.css")
        );
        assert_eq!(normalize_path(Path::new("/a/./b")), PathBuf::from("/a/b"));
    }

    #[test]
    fn test_memory_fs_versions_change_on_write() {
        let fs = MemoryFileSystem::new();
        fs.write("/a.st.css", ".a {}");
        let first = fs.fingerprint(Path::new("/a.st.css")).unwrap();
        assert_eq!(first, fs.fingerprint(Path::new("/a.st.css")).unwrap());

        fs.write("/a.st.css", ".b {}");
        let second = fs.fingerprint(Path::new("/a.st.css")).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_memory_fs_clones_share_storage() {
        let fs = MemoryFileSystem::new();
        let handle = fs.clone();
        handle.write("/x/./y.st.css", ".y {}");
        assert!(fs.exists(Path::new("/x/y.st.css")));
        assert_eq!(fs.read_to_string(Path::new("/x/y.st.css")).unwrap(), ".y {}");
        assert_eq!(handle.read_count(), 1);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let fs = MemoryFileSystem::new();
        let err = fs.read_to_string(Path::new("/missing.st.css")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_load_stylesheet_reports_parse_errors() {
        let fs = MemoryFileSystem::with_files([("/bad.st.css", ".a { color: red;")]);
        let result = load_stylesheet(&fs, Path::new("/bad.st.css"));
        assert!(matches!(result, Err(CommonError::Parse(_))));
    }

    #[test]
    fn test_real_fs_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.st.css");
        std::fs::write(&path, ".a { color: red; }").unwrap();

        let fs = RealFileSystem;
        assert!(fs.exists(&path));
        assert!(fs.fingerprint(&path).is_ok());
        let (sheet, source) = load_stylesheet(&fs, &path).unwrap();
        assert_eq!(sheet.nodes.len(), 1);
        assert!(source.contains("color"));
    }
}
