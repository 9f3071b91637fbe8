//! Cross-file symbol resolution
//!
//! Handles following import records from one file's metadata to the file
//! that defines a symbol, across any number of hops.

use crate::file_processor::{FileProcessor, ProcessError};
use crate::metadata::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use stylescope_common::{DiagnosticKind, Diagnostics, Locator};
use tracing::{debug, instrument};

/// Definition a local name ultimately refers to
#[derive(Debug, Clone)]
pub struct ResolvedSymbol {
    /// Metadata of the defining file
    pub meta: Rc<Metadata>,
    /// Name of the symbol in the defining file
    pub name: String,
    pub symbol: Symbol,
}

impl ResolvedSymbol {
    pub fn kind(&self) -> SymbolKind {
        self.symbol.kind()
    }
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(ResolvedSymbol),
    Unresolved,
}

impl Resolution {
    pub fn resolved(self) -> Option<ResolvedSymbol> {
        match self {
            Resolution::Resolved(symbol) => Some(symbol),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

type SymbolKey = (PathBuf, String);

/// Resolves symbols through import chains.
///
/// Results are memoized per (file, name) for the current pass; call
/// [`Resolver::start_pass`] before each compile so edits made between passes
/// are observed. The processor cache survives passes.
pub struct Resolver {
    processor: FileProcessor,
    memo: HashMap<SymbolKey, Option<ResolvedSymbol>>,
    /// (importing file, request) pairs already reported this pass
    reported: HashSet<SymbolKey>,
}

impl Resolver {
    pub fn new(processor: FileProcessor) -> Self {
        Self {
            processor,
            memo: HashMap::new(),
            reported: HashSet::new(),
        }
    }

    pub fn processor(&self) -> &FileProcessor {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut FileProcessor {
        &mut self.processor
    }

    /// Forget memoized resolutions and reported problems
    pub fn start_pass(&mut self) {
        self.memo.clear();
        self.reported.clear();
    }

    pub fn process(&mut self, path: &Path) -> Result<Rc<Metadata>, ProcessError> {
        self.processor.process(path)
    }

    /// Resolve `name` as seen from `meta` to its defining file
    #[instrument(skip(self, meta, diagnostics), fields(file = %meta.source.display()))]
    pub fn resolve(
        &mut self,
        meta: &Rc<Metadata>,
        name: &str,
        diagnostics: &mut Diagnostics,
    ) -> Resolution {
        let mut visited = HashSet::new();
        match self.resolve_in(meta, name, &mut visited, diagnostics) {
            Some(symbol) => Resolution::Resolved(symbol),
            None => Resolution::Unresolved,
        }
    }

    /// Metadata of the file an import record points at. Missing or broken
    /// files are reported once per (importing file, request) and pass.
    pub fn resolve_import(
        &mut self,
        meta: &Metadata,
        imported: &Imported,
        diagnostics: &mut Diagnostics,
    ) -> Option<Rc<Metadata>> {
        match self.processor.process(&imported.from) {
            Ok(target) => Some(target),
            Err(err) => {
                debug!(request = %imported.request, error = %err, "Import failed");
                let key = (meta.source.clone(), imported.request.clone());
                if self.reported.insert(key) {
                    let locator = Locator::new(Some(&meta.source_str()), imported.span)
                        .with_word(imported.request.clone());
                    match err {
                        ProcessError::Parse { path, source } => diagnostics.error(
                            DiagnosticKind::InvalidSyntax {
                                path,
                                message: source.to_string(),
                            },
                            locator,
                        ),
                        ProcessError::NotFound { .. } | ProcessError::Io { .. } => diagnostics
                            .warn(
                                DiagnosticKind::UnknownImportedFile {
                                    path: imported.request.clone(),
                                },
                                locator,
                            ),
                    }
                }
                None
            }
        }
    }

    fn resolve_in(
        &mut self,
        meta: &Rc<Metadata>,
        name: &str,
        visited: &mut HashSet<SymbolKey>,
        diagnostics: &mut Diagnostics,
    ) -> Option<ResolvedSymbol> {
        let key = (meta.source.clone(), name.to_string());
        if let Some(hit) = self.memo.get(&key) {
            return hit.clone();
        }
        if !visited.insert(key.clone()) {
            diagnostics.warn(
                DiagnosticKind::CyclicImport {
                    name: name.to_string(),
                },
                Locator::new(Some(&meta.source_str()), Default::default()).with_word(name),
            );
            return None;
        }

        let result = match meta.symbols.get(name) {
            None => None,
            Some(Symbol::Import(import)) => self.follow_import(meta, import, visited, diagnostics),
            Some(symbol) => Some(ResolvedSymbol {
                meta: Rc::clone(meta),
                name: name.to_string(),
                symbol: symbol.clone(),
            }),
        };

        self.memo.insert(key, result.clone());
        result
    }

    fn follow_import(
        &mut self,
        meta: &Rc<Metadata>,
        import: &ImportSymbol,
        visited: &mut HashSet<SymbolKey>,
        diagnostics: &mut Diagnostics,
    ) -> Option<ResolvedSymbol> {
        let imported = meta.import_of(import)?;
        let target = self.resolve_import(meta, imported, diagnostics)?;

        let target_name = match &import.imported {
            ImportedName::Default => ROOT_CLASS,
            ImportedName::Named(name) => name.as_str(),
        };
        if !target.symbols.contains_key(target_name) {
            diagnostics.warn(
                DiagnosticKind::UnknownImportedSymbol {
                    name: target_name.to_string(),
                    path: imported.request.clone(),
                },
                Locator::new(Some(&meta.source_str()), imported.span).with_word(target_name),
            );
            return None;
        }

        self.resolve_in(&target, target_name, visited, diagnostics)
    }
}
