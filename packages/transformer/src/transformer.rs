//! Per-file transform pass: turns a stylesheet's metadata into scoped CSS
//! plus the export map of its generated identifiers.

use crate::custom_selectors::{expand_custom_selectors, Expansion};
use crate::dead_rules::remove_unused_rules;
use crate::mixin::{create_class_subset_root, merge_rules_at, MixinError};
use crate::values::replace_value_functions;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::rc::Rc;
use stylescope_bundle::{
    scoped_name, Metadata, Resolver, Symbol, SymbolKind, EXTENDS, IMPORT_SELECTOR, MIXIN,
    ROOT_CLASS, VARS_SELECTOR,
};
use stylescope_common::{
    walk_at_rule_mut, walk_nodes_mut, DiagnosticKind, Diagnostics, Locator, VisitorMut,
};
use stylescope_parser::ast::{AtRule, Declaration, Node, Rule, Span, Stylesheet};
use stylescope_parser::{SelectorKind, SelectorNode, Visit};
use tracing::{debug, info, instrument};

/// `value()` references are followed at most this deep
const MAX_VAR_DEPTH: usize = 32;

const ANIMATION_PROPS: &[&str] = &["animation", "animation-name"];

#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Files reachable from the build entries; when set, rules that only
    /// style symbols from other files are dropped
    pub used_files: Option<BTreeSet<PathBuf>>,
}

/// Local name → generated name (or value, for vars)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Exports {
    pub classes: BTreeMap<String, String>,
    pub vars: BTreeMap<String, String>,
    pub keyframes: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub ast: Stylesheet,
    pub exports: Exports,
}

pub struct Transformer<'r> {
    resolver: &'r mut Resolver,
    /// Scoped, mixin-free output per file, used as mixin content
    mixin_sources: HashMap<PathBuf, Rc<Vec<Node>>>,
}

impl<'r> Transformer<'r> {
    pub fn new(resolver: &'r mut Resolver) -> Self {
        Self {
            resolver,
            mixin_sources: HashMap::new(),
        }
    }

    #[instrument(skip_all, fields(path = %meta.source.display()))]
    pub fn transform(
        &mut self,
        meta: &Rc<Metadata>,
        options: &TransformOptions,
        diagnostics: &mut Diagnostics,
    ) -> Result<TransformOutput, MixinError> {
        let mut nodes = self.scoped_nodes(meta, options.used_files.as_ref(), diagnostics);
        self.apply_mixins(meta, &mut nodes, diagnostics)?;
        let exports = self.exports(meta, diagnostics);

        info!(
            classes = exports.classes.len(),
            vars = exports.vars.len(),
            "Transformed stylesheet"
        );
        Ok(TransformOutput {
            ast: Stylesheet {
                path: meta.ast.path.clone(),
                nodes,
            },
            exports,
        })
    }

    /// Source nodes without directives, with dead rules removed and every
    /// selector and value rewritten
    fn scoped_nodes(
        &mut self,
        meta: &Rc<Metadata>,
        used_files: Option<&BTreeSet<PathBuf>>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Node> {
        let mut nodes: Vec<Node> = meta
            .ast
            .nodes
            .iter()
            .filter(|node| !is_directive(node))
            .cloned()
            .collect();

        for imported in &meta.imports {
            self.resolver.resolve_import(meta, imported, diagnostics);
        }
        if let Some(used_files) = used_files {
            for imported in &meta.imports {
                remove_unused_rules(&mut nodes, meta, imported, used_files);
            }
        }

        let mut pass = ScopePass {
            resolver: &mut *self.resolver,
            meta,
            diagnostics,
            in_keyframes: false,
        };
        walk_nodes_mut(&mut pass, &mut nodes);
        nodes
    }

    fn apply_mixins(
        &mut self,
        meta: &Rc<Metadata>,
        nodes: &mut Vec<Node>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), MixinError> {
        let mut index = 0;
        while index < nodes.len() {
            let applications = match &mut nodes[index] {
                Node::Rule(rule) => mixin_applications(rule),
                Node::AtRule(at_rule) => {
                    if let Some(children) = &mut at_rule.nodes {
                        self.apply_mixins(meta, children, diagnostics)?;
                    }
                    Vec::new()
                }
                Node::Decl(_) => Vec::new(),
            };
            if applications.is_empty() {
                index += 1;
                continue;
            }

            let mut inserted = 0;
            for (name, span) in applications {
                let resolved = self
                    .resolver
                    .resolve(meta, &name, diagnostics)
                    .resolved()
                    .filter(|resolved| resolved.kind() == SymbolKind::Class);
                let Some(resolved) = resolved else {
                    diagnostics.warn(
                        DiagnosticKind::UnknownMixin { name: name.clone() },
                        Locator::new(Some(&meta.source_str()), span).with_word(name),
                    );
                    continue;
                };

                let source = self.mixin_source(&resolved.meta);
                let prefix = format!(".{}", scoped_name(&resolved.meta.namespace, &resolved.name));
                let subset =
                    create_class_subset_root(&source, &prefix, resolved.name == ROOT_CLASS);
                debug!(mixin = %name, nodes = subset.len(), "Applying mixin");
                let mixin = Stylesheet { path: None, nodes: subset };
                inserted += merge_rules_at(mixin, nodes, index, index + 1 + inserted)?;
            }

            if let Node::Rule(rule) = &mut nodes[index] {
                rule.nodes.retain(|node| !is_decl(node, MIXIN));
            }
            index += 1 + inserted;
        }
        Ok(())
    }

    fn mixin_source(&mut self, meta: &Rc<Metadata>) -> Rc<Vec<Node>> {
        if let Some(source) = self.mixin_sources.get(&meta.source) {
            return Rc::clone(source);
        }

        // Problems in the mixin's own file are reported when that file is
        // compiled
        let mut scratch = Diagnostics::new();
        let mut nodes = self.scoped_nodes(meta, None, &mut scratch);
        walk_nodes_mut(&mut StripDecls(MIXIN), &mut nodes);

        let source = Rc::new(nodes);
        self.mixin_sources
            .insert(meta.source.clone(), Rc::clone(&source));
        source
    }

    fn exports(&mut self, meta: &Rc<Metadata>, diagnostics: &mut Diagnostics) -> Exports {
        let mut exports = Exports::default();
        for class in meta.classes() {
            exports
                .classes
                .insert(class.name.clone(), scoped_name(&meta.namespace, &class.name));
        }
        for var in meta.vars() {
            let value = resolve_values(self.resolver, meta, &var.value, var.span, 0, diagnostics);
            exports.vars.insert(var.name.clone(), value);
        }
        for keyframes in meta.keyframes() {
            exports.keyframes.insert(
                keyframes.name.clone(),
                scoped_name(&meta.namespace, &keyframes.name),
            );
        }
        exports
    }
}

/// Rewrites selectors, values and keyframes names of one file
struct ScopePass<'a> {
    resolver: &'a mut Resolver,
    meta: &'a Rc<Metadata>,
    diagnostics: &'a mut Diagnostics,
    /// Keyframe selectors (`from`, `50%`) are not scoped
    in_keyframes: bool,
}

impl ScopePass<'_> {
    fn locator(&self, span: Span) -> Locator {
        Locator::new(Some(&self.meta.source_str()), span)
    }

    fn expand_custom_selectors(&mut self, rule: &mut Rule) {
        match expand_custom_selectors(&rule.selector, &self.meta.custom_selectors) {
            Expansion::Unchanged => {}
            Expansion::Expanded(selector) => rule.selector = selector,
            Expansion::Unknown { name } => {
                let locator = self.locator(rule.span).with_word(name);
                self.diagnostics.warn(
                    DiagnosticKind::UnknownCustomSelector {
                        selector: rule.selector.trim().to_string(),
                    },
                    locator,
                );
            }
        }
    }

    fn scope_selector(&mut self, rule: &mut Rule) {
        let mut ast = rule.selector_ast();
        ast.walk(|ast, cursor| {
            let node = ast.node(cursor.node);
            match node.kind {
                SelectorKind::Class => {
                    let name = node.name.clone();
                    let scoped = self.class_name(&name);
                    ast.node_mut(cursor.node).name = scoped;
                }
                SelectorKind::Element => {
                    let name = node.name.clone();
                    if let Some(scoped) = self.imported_class_name(&name) {
                        let node = ast.node_mut(cursor.node);
                        let before = std::mem::take(&mut node.before);
                        let after = std::mem::take(&mut node.after);
                        *node = SelectorNode {
                            before,
                            after,
                            ..SelectorNode::new(SelectorKind::Class, scoped)
                        };
                    }
                }
                _ => {}
            }
            Visit::Continue
        });
        rule.selector = ast.stringify();
    }

    /// Generated identifier for a class name used in this file
    fn class_name(&mut self, name: &str) -> String {
        self.imported_class_name(name)
            .unwrap_or_else(|| scoped_name(&self.meta.namespace, name))
    }

    /// Generated identifier of the class an import binding resolves to
    fn imported_class_name(&mut self, name: &str) -> Option<String> {
        if !matches!(self.meta.symbol(name), Some(Symbol::Import(_))) {
            return None;
        }
        self.resolver
            .resolve(self.meta, name, self.diagnostics)
            .resolved()
            .filter(|resolved| resolved.kind() == SymbolKind::Class)
            .map(|resolved| scoped_name(&resolved.meta.namespace, &resolved.name))
    }

    fn check_extends(&mut self, decl: &Declaration) {
        let name = decl.value.trim();
        if !matches!(self.meta.symbol(name), Some(Symbol::Import(_))) {
            return;
        }
        if !self
            .resolver
            .resolve(self.meta, name, self.diagnostics)
            .is_resolved()
        {
            let locator = self.locator(decl.span).with_word(name);
            self.diagnostics.warn(
                DiagnosticKind::CannotResolveExtend {
                    name: name.to_string(),
                },
                locator,
            );
        }
    }

    fn keyframes_name(&mut self, name: &str) -> Option<String> {
        match self.meta.symbol(name) {
            Some(Symbol::Keyframes(_)) | Some(Symbol::Import(_)) => self
                .resolver
                .resolve(self.meta, name, self.diagnostics)
                .resolved()
                .filter(|resolved| resolved.kind() == SymbolKind::Keyframes)
                .map(|resolved| scoped_name(&resolved.meta.namespace, &resolved.name)),
            _ => None,
        }
    }

    fn rename_animations(&mut self, value: &str) -> String {
        let mut parts = Vec::new();
        for part in value.split(',') {
            let mut words = Vec::new();
            for word in part.split(' ') {
                words.push(self.keyframes_name(word).unwrap_or_else(|| word.to_string()));
            }
            parts.push(words.join(" "));
        }
        parts.join(",")
    }
}

impl VisitorMut for ScopePass<'_> {
    fn visit_rule_mut(&mut self, rule: &mut Rule) {
        if !self.in_keyframes {
            self.expand_custom_selectors(rule);
            self.scope_selector(rule);

            for decl in rule.decls().filter(|decl| decl.prop == EXTENDS) {
                self.check_extends(decl);
            }
            rule.nodes.retain(|node| !is_decl(node, EXTENDS));
        }

        walk_nodes_mut(self, &mut rule.nodes);
    }

    fn visit_decl_mut(&mut self, decl: &mut Declaration) {
        decl.value = resolve_values(
            self.resolver,
            self.meta,
            &decl.value,
            decl.span,
            0,
            self.diagnostics,
        );
        if ANIMATION_PROPS.contains(&decl.prop.as_str()) {
            decl.value = self.rename_animations(&decl.value);
        }
    }

    fn visit_at_rule_mut(&mut self, at_rule: &mut AtRule) {
        if at_rule.name == "keyframes" {
            let name = at_rule.params.trim().to_string();
            if matches!(self.meta.symbol(&name), Some(Symbol::Keyframes(_))) {
                at_rule.params = scoped_name(&self.meta.namespace, &name);
            }
            let outer = std::mem::replace(&mut self.in_keyframes, true);
            walk_at_rule_mut(self, at_rule);
            self.in_keyframes = outer;
            return;
        }
        walk_at_rule_mut(self, at_rule);
    }
}

/// Replace `value(name)` references in `value`, as seen from `meta`.
/// Unresolvable names report `UNKNOWN_VAR` and stay as written.
fn resolve_values(
    resolver: &mut Resolver,
    meta: &Rc<Metadata>,
    value: &str,
    span: Span,
    depth: usize,
    diagnostics: &mut Diagnostics,
) -> String {
    replace_value_functions(value, |name| {
        let resolved = resolver
            .resolve(meta, name, diagnostics)
            .resolved()
            .and_then(|resolved| match resolved.symbol {
                Symbol::Var(var) => Some((resolved.meta, var)),
                _ => None,
            });
        let Some((defining, var)) = resolved else {
            diagnostics.warn(
                DiagnosticKind::UnknownVar {
                    name: name.to_string(),
                },
                Locator::new(Some(&meta.source_str()), span).with_word(name),
            );
            return None;
        };

        if depth >= MAX_VAR_DEPTH {
            return Some(var.value);
        }
        Some(resolve_values(
            resolver,
            &defining,
            &var.value,
            var.span,
            depth + 1,
            diagnostics,
        ))
    })
}

/// `(mixin name, declaration span)` for every name in the rule's
/// `-st-mixin` declarations
fn mixin_applications(rule: &Rule) -> Vec<(String, Span)> {
    rule.decls()
        .filter(|decl| decl.prop == MIXIN)
        .flat_map(|decl| {
            decl.value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(move |name| (name.to_string(), decl.span))
        })
        .collect()
}

fn is_directive(node: &Node) -> bool {
    match node {
        Node::Rule(rule) => {
            let selector = rule.selector.trim();
            selector == IMPORT_SELECTOR || selector == VARS_SELECTOR
        }
        Node::AtRule(at_rule) => matches!(at_rule.name.as_str(), "namespace" | "custom-selector"),
        Node::Decl(_) => false,
    }
}

fn is_decl(node: &Node, prop: &str) -> bool {
    matches!(node, Node::Decl(decl) if decl.prop == prop)
}

/// Removes declarations of one property everywhere
struct StripDecls(&'static str);

impl VisitorMut for StripDecls {
    fn visit_rule_mut(&mut self, rule: &mut Rule) {
        let prop = self.0;
        rule.nodes.retain(|node| !is_decl(node, prop));
        walk_nodes_mut(self, &mut rule.nodes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use stylescope_bundle::FileProcessor;
    use stylescope_common::MemoryFileSystem;
    use stylescope_parser::serialize;

    fn transform(files: &[(&str, &str)], entry: &str) -> (TransformOutput, Diagnostics, String) {
        let fs = MemoryFileSystem::with_files(files.iter().copied());
        let mut resolver = Resolver::new(FileProcessor::new(fs));
        let meta = resolver.process(Path::new(entry)).unwrap();
        let mut diagnostics = Diagnostics::new();
        let output = Transformer::new(&mut resolver)
            .transform(&meta, &TransformOptions::default(), &mut diagnostics)
            .unwrap();
        (output, diagnostics, meta.namespace.clone())
    }

    #[test]
    fn test_local_classes_are_namespaced() {
        let (output, diagnostics, ns) = transform(
            &[(
                "/a.st.css",
                "@namespace \"A\"; .root .label:hover, .label:not(.x) { color: red; }",
            )],
            "/a.st.css",
        );
        assert_eq!(ns, "A");
        assert_eq!(
            serialize(&output.ast),
            ".A__root .A__label:hover, .A__label:not(.A__x) {\n  color: red;\n}\n"
        );
        assert!(diagnostics.is_empty());
        assert_eq!(output.exports.classes.get("label").map(String::as_str), Some("A__label"));
    }

    #[test]
    fn test_imported_symbols_use_defining_namespace() {
        let (output, _, _) = transform(
            &[
                (
                    "/main.st.css",
                    r#"
                    @namespace "Main";
                    :import { -st-from: "./button.st.css"; -st-default: Button; -st-named: icon; }
                    .root Button .icon { color: red; }
                    "#,
                ),
                ("/button.st.css", "@namespace \"Btn\"; .icon {}"),
            ],
            "/main.st.css",
        );
        assert_eq!(
            serialize(&output.ast),
            ".Main__root .Btn__root .Btn__icon {\n  color: red;\n}\n"
        );
    }

    #[test]
    fn test_vars_and_keyframes() {
        let (output, diagnostics, _) = transform(
            &[
                (
                    "/a.st.css",
                    r#"
                    @namespace "A";
                    :import { -st-from: "./theme.st.css"; -st-named: brand; }
                    :vars { gap: 4px; border: 1px solid value(brand); }
                    @keyframes spin { from { left: 0 } }
                    .x { border: value(border); margin: value(gap) value(nope); animation: spin 1s, other 2s; }
                    "#,
                ),
                ("/theme.st.css", ":vars { brand: value(base); base: blue; }"),
            ],
            "/a.st.css",
        );

        let css = serialize(&output.ast);
        assert!(css.contains("@keyframes A__spin {"));
        assert!(css.contains("border: 1px solid blue;"));
        assert!(css.contains("margin: 4px value(nope);"));
        assert!(css.contains("animation: A__spin 1s, other 2s;"));
        assert!(!css.contains(":vars"));
        assert!(!css.contains(":import"));

        assert!(diagnostics.contains(&DiagnosticKind::UnknownVar {
            name: "nope".to_string()
        }));
        assert_eq!(
            output.exports.vars.get("border").map(String::as_str),
            Some("1px solid blue")
        );
        assert_eq!(
            output.exports.keyframes.get("spin").map(String::as_str),
            Some("A__spin")
        );
    }

    #[test]
    fn test_keyframes_values_are_resolved() {
        let (output, diagnostics, _) = transform(
            &[(
                "/a.st.css",
                r#"
                @namespace "A";
                :vars { c: red; }
                @keyframes k { from { color: value(c); } 50% { color: value(missing); } }
                "#,
            )],
            "/a.st.css",
        );

        assert_eq!(
            serialize(&output.ast),
            "@keyframes A__k {\n  from {\n    color: red;\n  }\n  50% {\n    color: value(missing);\n  }\n}\n"
        );
        assert!(diagnostics.contains(&DiagnosticKind::UnknownVar {
            name: "missing".to_string()
        }));
    }

    #[test]
    fn test_custom_selectors() {
        let (output, diagnostics, _) = transform(
            &[(
                "/a.st.css",
                "@namespace \"A\"; @custom-selector :--btn .a, .b; :--btn:hover { x: 1; } :--nope { y: 2; }",
            )],
            "/a.st.css",
        );
        let css = serialize(&output.ast);
        assert!(css.contains(".A__a:hover, .A__b:hover {"));
        assert!(css.contains(":--nope {"));
        assert!(diagnostics.contains(&DiagnosticKind::UnknownCustomSelector {
            selector: ":--nope".to_string()
        }));
    }

    #[test]
    fn test_extends_through_missing_import() {
        let (output, diagnostics, _) = transform(
            &[(
                "/a.st.css",
                r#"
                :import { -st-from: "./missing.st.css"; -st-default: Gone; }
                .x { -st-extends: Gone; color: red; }
                "#,
            )],
            "/a.st.css",
        );
        assert!(diagnostics.contains(&DiagnosticKind::UnknownImportedFile {
            path: "./missing.st.css".to_string()
        }));
        assert!(diagnostics.contains(&DiagnosticKind::CannotResolveExtend {
            name: "Gone".to_string()
        }));
        assert!(!serialize(&output.ast).contains("-st-extends"));
    }

    #[test]
    fn test_mixins_from_other_file() {
        let (output, diagnostics, _) = transform(
            &[
                (
                    "/main.st.css",
                    r#"
                    @namespace "Main";
                    :import { -st-from: "./mix.st.css"; -st-named: shiny; }
                    .btn { -st-mixin: shiny, ghost; padding: 0; }
                    "#,
                ),
                (
                    "/mix.st.css",
                    "@namespace \"Mix\"; .shiny { color: gold; } .shiny:hover { color: white; } .other { x: 1; }",
                ),
            ],
            "/main.st.css",
        );

        assert_eq!(
            serialize(&output.ast),
            ".Main__btn {\n  color: gold;\n  padding: 0;\n}\n.Main__btn:hover {\n  color: white;\n}\n"
        );
        assert_eq!(diagnostics.with_code("UNKNOWN_MIXIN").count(), 1);
    }

    #[test]
    fn test_several_mixins_keep_their_order() {
        let (output, _, _) = transform(
            &[(
                "/a.st.css",
                r#"
                @namespace "A";
                .m1 { a: 1; } .m1:hover { c: 1; }
                .m2 { a: 2; } .m2:hover { c: 2; }
                .t { -st-mixin: m1, m2; }
                "#,
            )],
            "/a.st.css",
        );

        let css = serialize(&output.ast);
        assert!(css.contains(
            ".A__t {\n  a: 1;\n  a: 2;\n}\n.A__t:hover {\n  c: 1;\n}\n.A__t:hover {\n  c: 2;\n}\n"
        ));
    }

    #[test]
    fn test_local_mixin_and_root_mixin() {
        let (output, _, _) = transform(
            &[
                (
                    "/main.st.css",
                    r#"
                    @namespace "Main";
                    :import { -st-from: "./card.st.css"; -st-default: Card; }
                    .base { color: red; }
                    .a { -st-mixin: base; }
                    .b { -st-mixin: Card; }
                    "#,
                ),
                (
                    "/card.st.css",
                    "@namespace \"Card\"; .root { border: 0; } .title { font: bold; }",
                ),
            ],
            "/main.st.css",
        );

        let css = serialize(&output.ast);
        assert!(css.contains(".Main__a {\n  color: red;\n}"));
        assert!(css.contains(".Main__b {\n  border: 0;\n}\n.Main__b .Card__title {\n  font: bold;\n}"));
        assert!(!css.contains("-st-mixin"));
    }

    #[test]
    fn test_unused_files_prune_rules() {
        let fs = MemoryFileSystem::with_files([
            (
                "/main.st.css",
                ":import { -st-from: \"./b.st.css\"; -st-default: B; } B { x: 1; } .keep { y: 2; }",
            ),
            ("/b.st.css", ".root {}"),
        ]);
        let mut resolver = Resolver::new(FileProcessor::new(fs));
        let meta = resolver.process(Path::new("/main.st.css")).unwrap();
        let options = TransformOptions {
            used_files: Some(BTreeSet::from([PathBuf::from("/main.st.css")])),
        };
        let mut diagnostics = Diagnostics::new();
        let output = Transformer::new(&mut resolver)
            .transform(&meta, &options, &mut diagnostics)
            .unwrap();
        assert_eq!(output.ast.rules().count(), 1);
    }
}
