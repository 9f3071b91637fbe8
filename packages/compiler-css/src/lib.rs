//! Compile API: entry stylesheet path → CSS text, export map and the
//! diagnostics collected on the way.

use serde::Serialize;
use std::path::Path;
use stylescope_bundle::{FileProcessor, ProcessError, Resolver};
use stylescope_common::{Diagnostics, FileSystem};
use stylescope_parser::serialize;
use stylescope_transformer::{MixinError, Transformer};

pub use stylescope_transformer::{Exports, TransformOptions};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Mixin(#[from] MixinError),
}

#[derive(Debug, Clone, Serialize)]
pub struct CompileOutput {
    pub css: String,
    pub exports: Exports,
    /// Processing diagnostics of the entry file, then transform diagnostics
    pub diagnostics: Diagnostics,
}

impl CompileOutput {
    pub fn exports_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.exports)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Compiles stylesheets of one project. Processed metadata is cached across
/// calls; resolution results are not.
pub struct Compiler {
    resolver: Resolver,
}

impl Compiler {
    pub fn new(processor: FileProcessor) -> Self {
        Self {
            resolver: Resolver::new(processor),
        }
    }

    pub fn with_fs(fs: impl FileSystem + 'static) -> Self {
        Self::new(FileProcessor::new(fs))
    }

    pub fn processor_mut(&mut self) -> &mut FileProcessor {
        self.resolver.processor_mut()
    }

    #[instrument(skip(self, options), fields(path = %path.display()))]
    pub fn compile(
        &mut self,
        path: &Path,
        options: &TransformOptions,
    ) -> Result<CompileOutput, CompileError> {
        self.resolver.start_pass();
        let meta = self.resolver.process(path)?;

        let mut diagnostics = meta.diagnostics.clone();
        let output = Transformer::new(&mut self.resolver).transform(&meta, options, &mut diagnostics)?;

        Ok(CompileOutput {
            css: serialize(&output.ast),
            exports: output.exports,
            diagnostics,
        })
    }
}

/// Compile one file with default options
pub fn compile_file(fs: impl FileSystem + 'static, path: &Path) -> Result<CompileOutput, CompileError> {
    Compiler::with_fs(fs).compile(path, &TransformOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylescope_common::MemoryFileSystem;

    #[test]
    fn test_compile_simple_stylesheet() {
        let fs = MemoryFileSystem::with_files([(
            "/button.st.css",
            "@namespace \"Button\"; .root { padding: 8px 16px; } .label { color: white; }",
        )]);
        let output = compile_file(fs, Path::new("/button.st.css")).unwrap();

        assert_eq!(
            output.css,
            ".Button__root {\n  padding: 8px 16px;\n}\n.Button__label {\n  color: white;\n}\n"
        );
        assert!(output.diagnostics.is_empty());
        let json: serde_json::Value = serde_json::from_str(&output.exports_json().unwrap()).unwrap();
        assert_eq!(json["classes"]["label"], "Button__label");
    }

    #[test]
    fn test_missing_entry_is_an_error() {
        let result = compile_file(MemoryFileSystem::new(), Path::new("/nope.st.css"));
        assert!(matches!(
            result,
            Err(CompileError::Process(ProcessError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_recompile_sees_edits() {
        let fs = MemoryFileSystem::with_files([
            (
                "/main.st.css",
                ":import { -st-from: \"./theme.st.css\"; -st-named: brand; } .x { color: value(brand); }",
            ),
            ("/theme.st.css", ":vars { other: red; }"),
        ]);
        let mut compiler = Compiler::with_fs(fs.clone());
        let options = TransformOptions::default();

        let first = compiler.compile(Path::new("/main.st.css"), &options).unwrap();
        assert!(first.css.contains("value(brand)"));
        assert_eq!(first.diagnostics.with_code("UNKNOWN_IMPORTED_SYMBOL").count(), 1);

        fs.write("/theme.st.css", ":vars { brand: red; }");
        let second = compiler.compile(Path::new("/main.st.css"), &options).unwrap();
        assert!(second.css.contains("color: red;"));
        assert!(second.diagnostics.is_empty());
    }
}
