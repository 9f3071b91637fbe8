use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use stylescope_bundle::{
    DefaultPathResolver, DependencyGraph, FileProcessor, RealFileSystem, STYLESHEET_EXTENSION,
};
use stylescope_common::{format_diagnostic, normalize_path, Diagnostic, DiagnosticLevel};
use stylescope_compiler_css::{CompileOutput, Compiler, TransformOptions};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Project directory holding stylescope.config.json
    #[arg(default_value = ".")]
    pub path: String,

    /// Output directory (overrides config)
    #[arg(short, long)]
    pub out_dir: Option<String>,

    /// Print CSS to stdout instead of writing files
    #[arg(long)]
    pub stdout: bool,

    /// Show diagnostics with source context
    #[arg(long)]
    pub pretty: bool,
}

/// Counts of one build
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BuildSummary {
    pub files: usize,
    /// Files that could not be compiled at all
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl BuildSummary {
    pub fn has_errors(&self) -> bool {
        self.failed > 0 || self.errors > 0
    }
}

pub fn build(args: BuildArgs, cwd: &Path) -> Result<BuildSummary> {
    let root = normalize_path(&cwd.join(&args.path));
    let config = Config::load(&root)?;
    let src_dir = config.src_dir(&root);
    if !src_dir.exists() {
        return Err(anyhow!("Source directory does not exist: {}", src_dir.display()));
    }
    let out_dir = match &args.out_dir {
        Some(out) => root.join(out),
        None => config.out_dir(&root),
    };

    println!("{}", "Building stylesheets...".bright_blue().bold());
    let files = find_stylesheets(&src_dir);
    if files.is_empty() {
        println!("{}", "No .st.css files found".yellow());
        return Ok(BuildSummary::default());
    }
    println!("Found {} files", files.len());

    let mut processor = FileProcessor::new(RealFileSystem)
        .with_path_resolver(DefaultPathResolver::with_module_dirs(config.module_dirs(&root)))
        .with_namespaces(config.namespaces(&root));

    let options = TransformOptions {
        used_files: config
            .optimize
            .then(|| used_files(&mut processor, &config, &root, &files)),
    };

    let mut compiler = Compiler::new(processor);
    let mut summary = BuildSummary::default();
    for file in &files {
        summary.files += 1;
        let relative = file.strip_prefix(&src_dir).unwrap_or(file);

        let output = match compiler.compile(file, &options) {
            Ok(output) => output,
            Err(err) => {
                summary.failed += 1;
                eprintln!("  {} {} - {}", "✗".red(), relative.display(), err.to_string().red());
                continue;
            }
        };

        report_diagnostics(output.diagnostics.iter(), args.pretty, &mut summary);
        if args.stdout {
            println!("/* {} */\n{}", relative.display(), output.css);
            continue;
        }

        let css_file = write_output(&out_dir, relative, &output)?;
        println!("  {} {} → {}", "✓".green(), relative.display(), css_file.display());
    }

    println!();
    if summary.has_errors() {
        println!(
            "{} Built {} files, {} errors, {} warnings",
            "✗".red(),
            summary.files - summary.failed,
            summary.errors + summary.failed,
            summary.warnings
        );
    } else {
        println!(
            "{} Built {} files ({} warnings)",
            "✓".green(),
            summary.files,
            summary.warnings
        );
    }
    Ok(summary)
}

fn find_stylesheets(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.to_string_lossy().ends_with(STYLESHEET_EXTENSION))
        .collect();
    files.sort();
    files
}

/// Files reachable from the configured entries (every source file when no
/// entries are configured)
fn used_files(
    processor: &mut FileProcessor,
    config: &Config,
    root: &Path,
    files: &[PathBuf],
) -> BTreeSet<PathBuf> {
    let entries = match config.entries(root) {
        entries if entries.is_empty() => files.to_vec(),
        entries => entries,
    };
    let graph = DependencyGraph::build(processor, &entries);
    if let Err(err) = graph.detect_circular_imports() {
        warn!(error = %err, "Import graph has a cycle");
    }
    let used = graph.reachable_from(&entries);
    info!(entries = entries.len(), used = used.len(), "Computed used files");
    used
}

/// Write `<name>.css` and `<name>.json` next to each other, mirroring the
/// source tree. Returns the CSS path.
fn write_output(out_dir: &Path, relative: &Path, output: &CompileOutput) -> Result<PathBuf> {
    let file_name = relative
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name
        .strip_suffix(STYLESHEET_EXTENSION)
        .unwrap_or(&file_name);
    let dir = match relative.parent() {
        Some(parent) => out_dir.join(parent),
        None => out_dir.to_path_buf(),
    };
    fs::create_dir_all(&dir).with_context(|| format!("Cannot create {}", dir.display()))?;

    let css_file = dir.join(format!("{}.css", stem));
    fs::write(&css_file, &output.css)
        .with_context(|| format!("Cannot write {}", css_file.display()))?;
    let json_file = dir.join(format!("{}.json", stem));
    fs::write(&json_file, output.exports_json()?)
        .with_context(|| format!("Cannot write {}", json_file.display()))?;

    Ok(css_file)
}

fn report_diagnostics<'a>(
    diagnostics: impl Iterator<Item = &'a Diagnostic>,
    pretty: bool,
    summary: &mut BuildSummary,
) {
    for diagnostic in diagnostics {
        match diagnostic.level {
            DiagnosticLevel::Error => summary.errors += 1,
            DiagnosticLevel::Warning => summary.warnings += 1,
            DiagnosticLevel::Info => {}
        }

        let source = diagnostic
            .locator
            .path
            .as_ref()
            .filter(|_| pretty)
            .and_then(|path| fs::read_to_string(path).ok());
        if let Some(source) = source {
            eprintln!("{}", format_diagnostic(&source, diagnostic));
            continue;
        }

        let line = diagnostic.to_string();
        match diagnostic.level {
            DiagnosticLevel::Error => eprintln!("    {}", line.red()),
            DiagnosticLevel::Warning => eprintln!("    {}", line.yellow()),
            DiagnosticLevel::Info => eprintln!("    {}", line.dimmed()),
        }
    }
}
