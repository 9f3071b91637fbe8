/// Import dependency graph
///
/// Tracks which stylesheet imports which, answers reachability queries
/// (the "used files" of a build) and detects circular imports.
use crate::file_processor::FileProcessor;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use stylescope_common::normalize_path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Circular import detected: {path}")]
    CircularImport { path: String },
}

/// File → files it imports, with the reverse lookup
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    dependencies: HashMap<PathBuf, Vec<PathBuf>>,
    dependents: HashMap<PathBuf, Vec<PathBuf>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk imports breadth-first from `entries`, processing every file
    /// reached. Files that fail to process are recorded without edges.
    pub fn build(processor: &mut FileProcessor, entries: &[PathBuf]) -> Self {
        let mut graph = Self::new();
        let mut queue: VecDeque<PathBuf> = entries.iter().map(|p| normalize_path(p)).collect();
        let mut seen = HashSet::new();

        while let Some(path) = queue.pop_front() {
            if !seen.insert(path.clone()) {
                continue;
            }
            let targets: Vec<PathBuf> = match processor.process(&path) {
                Ok(meta) => meta
                    .imports
                    .iter()
                    .map(|imported| imported.from.clone())
                    .collect(),
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "Skipping unprocessable file");
                    Vec::new()
                }
            };
            queue.extend(targets.iter().cloned());
            graph.set_dependencies(path, targets);
        }

        graph
    }

    /// Add a dependency relationship: source imports target
    pub fn add_dependency(&mut self, source: PathBuf, target: PathBuf) {
        self.dependencies
            .entry(source.clone())
            .or_default()
            .push(target.clone());
        self.dependents.entry(target).or_default().push(source);
    }

    /// Replace all dependencies of a file at once
    pub fn set_dependencies(&mut self, source: PathBuf, targets: Vec<PathBuf>) {
        if let Some(old_targets) = self.dependencies.get(&source) {
            for old_target in old_targets {
                if let Some(deps) = self.dependents.get_mut(old_target) {
                    deps.retain(|p| p != &source);
                }
            }
        }

        for target in &targets {
            self.dependents
                .entry(target.clone())
                .or_default()
                .push(source.clone());
        }

        self.dependencies.insert(source, targets);
    }

    pub fn get_dependencies(&self, path: &Path) -> Option<&[PathBuf]> {
        self.dependencies.get(path).map(|v| v.as_slice())
    }

    /// Files that import `path`
    pub fn get_dependents(&self, path: &Path) -> Option<&[PathBuf]> {
        self.dependents.get(path).map(|v| v.as_slice())
    }

    pub fn all_files(&self) -> HashSet<PathBuf> {
        let mut files = HashSet::new();
        files.extend(self.dependencies.keys().cloned());
        files.extend(self.dependents.keys().cloned());
        files
    }

    /// Every file reachable from `entries`, the entries included
    pub fn reachable_from(&self, entries: &[PathBuf]) -> BTreeSet<PathBuf> {
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<PathBuf> = entries.iter().map(|p| normalize_path(p)).collect();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(deps) = self.dependencies.get(&current) {
                queue.extend(deps.iter().filter(|dep| !visited.contains(*dep)).cloned());
            }
        }

        visited
    }

    /// Error on the first import cycle found (DFS)
    pub fn detect_circular_imports(&self) -> Result<(), GraphError> {
        let mut visited = HashSet::new();
        let mut stack = HashSet::new();

        let mut files: Vec<&PathBuf> = self.dependencies.keys().collect();
        files.sort();
        for file in files {
            if !visited.contains(file) {
                self.dfs_detect_cycle(file, &mut visited, &mut stack)?;
            }
        }

        Ok(())
    }

    fn dfs_detect_cycle(
        &self,
        node: &Path,
        visited: &mut HashSet<PathBuf>,
        stack: &mut HashSet<PathBuf>,
    ) -> Result<(), GraphError> {
        visited.insert(node.to_path_buf());
        stack.insert(node.to_path_buf());

        if let Some(deps) = self.dependencies.get(node) {
            for dep in deps {
                if !visited.contains(dep) {
                    self.dfs_detect_cycle(dep, visited, stack)?;
                } else if stack.contains(dep) {
                    return Err(GraphError::CircularImport {
                        path: dep.to_string_lossy().to_string(),
                    });
                }
            }
        }

        stack.remove(node);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.dependencies.clear();
        self.dependents.clear();
    }
}
