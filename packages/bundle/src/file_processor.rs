use crate::metadata::Metadata;
use crate::path_resolver::{DefaultPathResolver, PathResolver};
use crate::processor::derive_metadata;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use stylescope_common::{
    load_stylesheet, normalize_path, CommonError, Diagnostics, FileSystem, Fingerprint,
};
use stylescope_parser::ParseError;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },
}

impl ProcessError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_string_lossy().to_string();
        if err.kind() == io::ErrorKind::NotFound {
            ProcessError::NotFound { path }
        } else {
            ProcessError::Io { path, source: err }
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    fingerprint: Fingerprint,
    meta: Rc<Metadata>,
}

/// Parses and derives metadata for stylesheet paths, caching the result
/// until the file's fingerprint changes.
///
/// One processor belongs to one compile session; its cache is not meant to
/// be shared between sessions with different file systems or resolvers.
pub struct FileProcessor {
    fs: Box<dyn FileSystem>,
    path_resolver: Box<dyn PathResolver>,
    /// Per-file namespace overrides (normalized path → namespace)
    namespaces: HashMap<PathBuf, String>,
    cache: HashMap<PathBuf, CacheEntry>,
    derivations: usize,
}

impl FileProcessor {
    pub fn new(fs: impl FileSystem + 'static) -> Self {
        Self {
            fs: Box::new(fs),
            path_resolver: Box::new(DefaultPathResolver::new()),
            namespaces: HashMap::new(),
            cache: HashMap::new(),
            derivations: 0,
        }
    }

    pub fn with_path_resolver(mut self, resolver: impl PathResolver + 'static) -> Self {
        self.path_resolver = Box::new(resolver);
        self
    }

    pub fn with_namespaces<P: AsRef<Path>>(
        mut self,
        namespaces: impl IntoIterator<Item = (P, String)>,
    ) -> Self {
        for (path, namespace) in namespaces {
            self.namespaces.insert(normalize_path(path.as_ref()), namespace);
        }
        self
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Resolve an import specifier with the configured path resolver
    pub fn resolve_path(&self, from_file: &Path, specifier: &str) -> Option<PathBuf> {
        self.path_resolver
            .resolve(self.fs.as_ref(), from_file, specifier)
    }

    /// Metadata for `path`, from cache when the fingerprint is unchanged
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn process(&mut self, path: &Path) -> Result<Rc<Metadata>, ProcessError> {
        let path = normalize_path(path);
        let fingerprint = self
            .fs
            .fingerprint(&path)
            .map_err(|err| ProcessError::from_io(&path, err))?;

        if let Some(entry) = self.cache.get(&path) {
            if entry.fingerprint == fingerprint {
                debug!("Metadata cache hit");
                return Ok(Rc::clone(&entry.meta));
            }
            debug!("Fingerprint changed, reprocessing");
        }

        let (ast, _source) = load_stylesheet(self.fs.as_ref(), &path).map_err(|err| match err {
            CommonError::Parse(source) => ProcessError::Parse {
                path: path.to_string_lossy().to_string(),
                source,
            },
            CommonError::Io(err) => ProcessError::from_io(&path, err),
        })?;

        let mut diagnostics = Diagnostics::new();
        let mut meta = derive_metadata(ast, &mut diagnostics);
        meta.diagnostics = diagnostics;

        for imported in &mut meta.imports {
            if let Some(resolved) =
                self.path_resolver
                    .resolve(self.fs.as_ref(), &path, &imported.request)
            {
                imported.from = resolved;
            }
        }
        if let Some(namespace) = self.namespaces.get(&path) {
            meta.namespace = namespace.clone();
        }

        self.derivations += 1;
        debug!(
            namespace = %meta.namespace,
            symbols = meta.symbols.len(),
            imports = meta.imports.len(),
            "Processed stylesheet"
        );

        let meta = Rc::new(meta);
        self.cache.insert(
            path,
            CacheEntry {
                fingerprint,
                meta: Rc::clone(&meta),
            },
        );
        Ok(meta)
    }

    /// Drop the cache entry for a path
    pub fn invalidate(&mut self, path: &Path) {
        self.cache.remove(&normalize_path(path));
    }

    /// Number of times metadata was derived (cache misses)
    pub fn derivations(&self) -> usize {
        self.derivations
    }
}
