use std::collections::BTreeSet;
use std::path::PathBuf;
use stylescope_bundle::{Imported, Metadata, Symbol};
use stylescope_common::retain_rules;
use stylescope_parser::ast::{Node, Rule};
use stylescope_parser::{SelectorKind, Visit};
use tracing::debug;

/// Local extends chains longer than this are treated as not reaching an import
const MAX_EXTENDS_DEPTH: usize = 32;

/// Drop rules that only style things coming from a file outside the build.
///
/// Nothing happens when `imported.from` is in `used_files`. Otherwise a rule
/// is removed, at any depth, when its selector has at most one chunk and
/// names one of the import's local bindings, or a class/element whose
/// `-st-extends` goes through an import of an unused file. Rules with
/// several chunks are kept whole.
pub fn remove_unused_rules(
    nodes: &mut Vec<Node>,
    meta: &Metadata,
    imported: &Imported,
    used_files: &BTreeSet<PathBuf>,
) {
    if used_files.contains(&imported.from) {
        return;
    }

    let symbols: BTreeSet<&str> = imported.local_names().collect();
    let mut removed = 0usize;
    retain_rules(nodes, &mut |rule: &Rule| {
        let keep = !is_dead(rule, meta, &symbols, used_files);
        if !keep {
            removed += 1;
        }
        keep
    });

    if removed > 0 {
        debug!(from = %imported.from.display(), removed, "Removed unused rules");
    }
}

fn is_dead(
    rule: &Rule,
    meta: &Metadata,
    symbols: &BTreeSet<&str>,
    used_files: &BTreeSet<PathBuf>,
) -> bool {
    let ast = rule.selector_ast();
    if ast.chunks().len() > 1 {
        return false;
    }

    let mut dead = false;
    ast.for_each(ast.root(), &mut |node, _| {
        if !matches!(node.kind, SelectorKind::Class | SelectorKind::Element) {
            return Visit::Continue;
        }
        if symbols.contains(node.name.as_str()) || extends_unused_file(meta, &node.name, used_files) {
            dead = true;
            return Visit::Stop;
        }
        Visit::Continue
    });
    dead
}

/// Follows local `-st-extends` links until one lands on an import
fn extends_unused_file(meta: &Metadata, name: &str, used_files: &BTreeSet<PathBuf>) -> bool {
    let mut current = name;
    for _ in 0..MAX_EXTENDS_DEPTH {
        let Some(extends) = meta.symbol(current).and_then(Symbol::extends) else {
            return false;
        };
        match meta.symbol(extends) {
            Some(Symbol::Import(import)) => {
                return meta
                    .import_of(import)
                    .is_some_and(|imported| !used_files.contains(&imported.from))
            }
            Some(_) => current = extends,
            None => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use stylescope_bundle::FileProcessor;
    use stylescope_common::MemoryFileSystem;
    use stylescope_parser::serialize;
    use stylescope_parser::ast::Stylesheet;

    const SOURCE: &str = r#"
        :import { -st-from: "./button.st.css"; -st-default: Button; -st-named: icon; }
        .panel { -st-extends: Button; color: red; }
        .panel:hover { color: blue; }
        .x Button { color: green; }
        .x .icon, .y { color: pink; }
        .keep { color: black; }
        @media print { Button { display: none; } }
    "#;

    fn metadata() -> std::rc::Rc<Metadata> {
        let fs = MemoryFileSystem::with_files([
            ("/main.st.css", SOURCE),
            ("/button.st.css", ".icon {}"),
        ]);
        FileProcessor::new(fs)
            .process(Path::new("/main.st.css"))
            .unwrap()
    }

    fn selectors(nodes: &[Node]) -> Vec<String> {
        let mut out = Vec::new();
        for node in nodes {
            match node {
                Node::Rule(rule) => out.push(rule.selector.clone()),
                Node::AtRule(at_rule) => out.extend(selectors(at_rule.nodes.as_deref().unwrap_or_default())),
                Node::Decl(_) => {}
            }
        }
        out
    }

    #[test]
    fn test_unused_import_removes_single_chunk_rules() {
        let meta = metadata();
        let mut nodes = meta.ast.nodes.clone();
        remove_unused_rules(&mut nodes, &meta, &meta.imports[0], &BTreeSet::new());

        assert_eq!(
            selectors(&nodes),
            vec![":import", ".x .icon, .y", ".keep"]
        );
        // The now empty media block stays
        let output = serialize(&Stylesheet { path: None, nodes });
        assert!(output.contains("@media print {\n}"));
    }

    #[test]
    fn test_local_extends_chain_reaching_unused_import() {
        let fs = MemoryFileSystem::with_files([
            (
                "/main.st.css",
                r#"
                :import { -st-from: "./button.st.css"; -st-default: Button; }
                .base { -st-extends: Button; }
                .derived { -st-extends: base; }
                .derived:hover { color: blue; }
                .loop { -st-extends: loop; }
                .keep { color: black; }
                "#,
            ),
            ("/button.st.css", ".root {}"),
        ]);
        let meta = FileProcessor::new(fs)
            .process(Path::new("/main.st.css"))
            .unwrap();
        let mut nodes = meta.ast.nodes.clone();
        remove_unused_rules(&mut nodes, &meta, &meta.imports[0], &BTreeSet::new());

        assert_eq!(selectors(&nodes), vec![":import", ".loop", ".keep"]);
    }

    #[test]
    fn test_used_import_is_untouched() {
        let meta = metadata();
        let mut nodes = meta.ast.nodes.clone();
        let used = BTreeSet::from([PathBuf::from("/button.st.css")]);
        remove_unused_rules(&mut nodes, &meta, &meta.imports[0], &used);
        assert_eq!(nodes, meta.ast.nodes);
    }
}
