use std::path::{Path, PathBuf};
use stylescope_common::{normalize_path, FileSystem};

/// Extension appended when a specifier names a stylesheet without one
pub const STYLESHEET_EXTENSION: &str = ".st.css";

/// Maps an import specifier to an absolute path
pub trait PathResolver {
    /// Resolve `specifier` as imported from `from_file`; `None` when no
    /// existing file matches
    fn resolve(&self, fs: &dyn FileSystem, from_file: &Path, specifier: &str) -> Option<PathBuf>;
}

/// Relative and absolute paths plus package lookup in module directories
#[derive(Debug, Clone, Default)]
pub struct DefaultPathResolver {
    module_dirs: Vec<PathBuf>,
}

impl DefaultPathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories searched, in order, for package specifiers
    pub fn with_module_dirs(module_dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            module_dirs: module_dirs.into_iter().collect(),
        }
    }

    fn candidates(&self, from_file: &Path, specifier: &str) -> Vec<PathBuf> {
        let bases: Vec<PathBuf> = if specifier.starts_with("./") || specifier.starts_with("../") {
            let dir = from_file.parent().unwrap_or_else(|| Path::new("/"));
            vec![dir.join(specifier)]
        } else if Path::new(specifier).is_absolute() {
            vec![PathBuf::from(specifier)]
        } else {
            self.module_dirs.iter().map(|dir| dir.join(specifier)).collect()
        };

        let mut candidates = Vec::new();
        for base in bases {
            let base = normalize_path(&base);
            if !specifier.ends_with(".css") {
                let mut with_extension = base.clone().into_os_string();
                with_extension.push(STYLESHEET_EXTENSION);
                candidates.push(base);
                candidates.push(PathBuf::from(with_extension));
            } else {
                candidates.push(base);
            }
        }
        candidates
    }
}

impl PathResolver for DefaultPathResolver {
    fn resolve(&self, fs: &dyn FileSystem, from_file: &Path, specifier: &str) -> Option<PathBuf> {
        self.candidates(from_file, specifier)
            .into_iter()
            .find(|candidate| fs.exists(candidate))
    }
}
