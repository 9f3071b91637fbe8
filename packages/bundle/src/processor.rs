//! Metadata derivation: one pass over a parsed stylesheet that builds the
//! symbol table, import records and custom-selector table.

use crate::metadata::*;
use crate::namespace::{derive_namespace, parse_namespace_param};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use stylescope_common::{normalize_path, DiagnosticKind, Diagnostics, Locator};
use stylescope_parser::ast::{AtRule, Node, Rule, Span, Stylesheet};
use stylescope_parser::{SelectorKind, Visit};

pub const IMPORT_SELECTOR: &str = ":import";
pub const VARS_SELECTOR: &str = ":vars";
pub const FROM: &str = "-st-from";
pub const DEFAULT: &str = "-st-default";
pub const NAMED: &str = "-st-named";
pub const EXTENDS: &str = "-st-extends";
pub const MIXIN: &str = "-st-mixin";

/// Path recorded for stylesheets parsed without an origin
const ANONYMOUS_SOURCE: &str = "/unknown.st.css";

/// Derive the [`Metadata`] of a parsed stylesheet.
///
/// The stylesheet's `path` is used as metadata source. Problems found on
/// the way are reported into `diagnostics`; derivation itself never fails.
pub fn derive_metadata(ast: Stylesheet, diagnostics: &mut Diagnostics) -> Metadata {
    let source = PathBuf::from(ast.path.as_deref().unwrap_or(ANONYMOUS_SOURCE));
    let namespace = derive_namespace(&source);
    let nodes = ast.nodes.clone();
    let mut meta = Metadata::new(source, namespace, ast);

    let mut processor = Processor {
        meta: &mut meta,
        diagnostics,
        pending_extends: Vec::new(),
    };
    processor.process_nodes(&nodes, true);
    processor.check_extends();

    meta
}

struct Processor<'a> {
    meta: &'a mut Metadata,
    diagnostics: &'a mut Diagnostics,
    /// (extended name, declaration span), validated once every symbol is known
    pending_extends: Vec<(String, Span)>,
}

impl Processor<'_> {
    fn locator(&self, span: Span) -> Locator {
        Locator::new(Some(&self.meta.source_str()), span)
    }

    fn process_nodes(&mut self, nodes: &[Node], top_level: bool) {
        for node in nodes {
            match node {
                Node::Rule(rule) if top_level && rule.selector.trim() == IMPORT_SELECTOR => {
                    self.process_import(rule)
                }
                Node::Rule(rule) if top_level && rule.selector.trim() == VARS_SELECTOR => {
                    self.process_vars(rule)
                }
                Node::Rule(rule) => {
                    self.process_rule(rule);
                    self.process_nodes(&rule.nodes, false);
                }
                Node::AtRule(at_rule) => self.process_at_rule(at_rule, top_level),
                Node::Decl(_) => {}
            }
        }
    }

    fn process_at_rule(&mut self, at_rule: &AtRule, top_level: bool) {
        match at_rule.name.as_str() {
            "namespace" if top_level => {
                if let Some(namespace) = parse_namespace_param(&at_rule.params) {
                    self.meta.namespace = namespace;
                }
            }
            "custom-selector" if top_level => {
                let params = at_rule.params.trim();
                let (name, selector) = params
                    .split_once(char::is_whitespace)
                    .unwrap_or((params, ""));
                if name.starts_with(":--") {
                    self.meta
                        .custom_selectors
                        .insert(name.to_string(), selector.trim().to_string());
                }
            }
            "keyframes" => {
                let name = at_rule.params.trim().to_string();
                if !name.is_empty() && !self.meta.symbols.contains_key(&name) {
                    self.meta.symbols.insert(
                        name.clone(),
                        Symbol::Keyframes(KeyframesSymbol {
                            name,
                            span: at_rule.span,
                        }),
                    );
                }
            }
            _ => {
                if let Some(children) = &at_rule.nodes {
                    self.process_nodes(children, false);
                }
            }
        }
    }

    fn process_import(&mut self, rule: &Rule) {
        let Some(from) = rule.find_decl(FROM) else {
            let locator = self.locator(rule.span);
            self.diagnostics
                .warn(DiagnosticKind::FromPropertyMissingInImport, locator);
            return;
        };

        let request = unquote(&from.value);
        let mut imported = Imported {
            from: lexical_import_path(&self.meta.source, &request),
            request,
            default_export: None,
            named: BTreeMap::new(),
            span: rule.span,
        };

        if let Some(default) = rule.find_decl(DEFAULT) {
            let name = default.value.trim();
            if !name.is_empty() {
                imported.default_export = Some(name.to_string());
            }
        }

        if let Some(named) = rule.find_decl(NAMED) {
            for entry in named.value.split(',') {
                let mut parts = entry.split_whitespace();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(name), None, _) => {
                        imported.named.insert(name.to_string(), name.to_string());
                    }
                    (Some(name), Some("as"), Some(local)) => {
                        imported.named.insert(local.to_string(), name.to_string());
                    }
                    _ => {}
                }
            }
        }

        let index = self.meta.imports.len();
        if let Some(default) = &imported.default_export {
            self.bind_import(default, ImportedName::Default, index);
        }
        for (local, name) in &imported.named {
            self.bind_import(local, ImportedName::Named(name.clone()), index);
        }
        self.meta.imports.push(imported);
    }

    fn bind_import(&mut self, local: &str, imported: ImportedName, import: usize) {
        self.meta.symbols.insert(
            local.to_string(),
            Symbol::Import(ImportSymbol {
                name: local.to_string(),
                imported,
                import,
            }),
        );
    }

    fn process_vars(&mut self, rule: &Rule) {
        for decl in rule.decls() {
            self.meta.symbols.insert(
                decl.prop.clone(),
                Symbol::Var(VarSymbol {
                    name: decl.prop.clone(),
                    value: decl.value.trim().to_string(),
                    span: decl.span,
                }),
            );
        }
    }

    fn process_rule(&mut self, rule: &Rule) {
        let ast = rule.selector_ast();
        let mut found = Vec::new();
        ast.for_each(ast.root(), &mut |node, _| {
            match node.kind {
                SelectorKind::Class => found.push((SelectorKind::Class, node.name.clone())),
                SelectorKind::Element if starts_uppercase(&node.name) => {
                    found.push((SelectorKind::Element, node.name.clone()))
                }
                _ => {}
            }
            Visit::Continue
        });

        for (kind, name) in found {
            if self.meta.symbols.contains_key(&name) {
                continue;
            }
            let symbol = match kind {
                SelectorKind::Class => Symbol::Class(ClassSymbol {
                    name: name.clone(),
                    extends: None,
                    span: rule.span,
                }),
                _ => Symbol::Element(ElementSymbol {
                    name: name.clone(),
                    extends: None,
                    span: rule.span,
                }),
            };
            self.meta.symbols.insert(name, symbol);
        }

        let Some(extends) = rule.find_decl(EXTENDS) else {
            return;
        };
        let target = extends.value.trim().to_string();

        let simple = match ast.chunks() {
            [chunk] => match ast.children(*chunk) {
                [only] => {
                    let node = ast.node(*only);
                    matches!(node.kind, SelectorKind::Class | SelectorKind::Element)
                        .then(|| node.name.clone())
                }
                _ => None,
            },
            _ => None,
        };

        let Some(owner) = simple else {
            let locator = self.locator(rule.span);
            self.diagnostics.warn(
                DiagnosticKind::CannotExtendInComplexSelector {
                    selector: rule.selector.trim().to_string(),
                },
                locator,
            );
            return;
        };

        match self.meta.symbols.get_mut(&owner) {
            Some(Symbol::Class(class)) => class.extends = Some(target.clone()),
            Some(Symbol::Element(element)) => element.extends = Some(target.clone()),
            _ => {}
        }
        self.pending_extends.push((target, extends.span));
    }

    fn check_extends(&mut self) {
        for (name, span) in std::mem::take(&mut self.pending_extends) {
            if !self.meta.symbols.contains_key(&name) {
                let locator = self.locator(span).with_word(name.clone());
                self.diagnostics
                    .warn(DiagnosticKind::CannotResolveExtend { name }, locator);
            }
        }
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// First quoted string of a value, or the first word when unquoted
pub fn unquote(value: &str) -> String {
    let value = value.trim();
    let mut chars = value.chars();
    match chars.next() {
        Some(quote @ ('"' | '\'')) => chars.take_while(|c| *c != quote).collect(),
        _ => value
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Where an import points before consulting the file system
pub fn lexical_import_path(importer: &Path, request: &str) -> PathBuf {
    if request.starts_with("./") || request.starts_with("../") {
        let dir = importer.parent().unwrap_or_else(|| Path::new("/"));
        normalize_path(&dir.join(request))
    } else {
        PathBuf::from(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylescope_parser::parse_with_path;

    fn process(source: &str) -> (Metadata, Diagnostics) {
        let ast = parse_with_path(source, "/src/main.st.css").unwrap();
        let mut diagnostics = Diagnostics::new();
        let meta = derive_metadata(ast, &mut diagnostics);
        (meta, diagnostics)
    }

    #[test]
    fn test_collects_classes_and_elements() {
        let (meta, diagnostics) = process(".a .b:hover, Button > span {} @media screen { .c {} }");
        assert!(diagnostics.is_empty());
        for name in ["root", "a", "b", "c"] {
            assert_eq!(meta.symbol(name).map(Symbol::kind), Some(SymbolKind::Class), "{}", name);
        }
        assert_eq!(meta.symbol("Button").map(Symbol::kind), Some(SymbolKind::Element));
        assert!(meta.symbol("span").is_none());
    }

    #[test]
    fn test_import_records() {
        let (meta, diagnostics) = process(
            r#"
            :import {
                -st-from: "./comp.st.css";
                -st-default: Comp;
                -st-named: a, b as c;
            }
            "#,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(meta.imports.len(), 1);

        let imported = &meta.imports[0];
        assert_eq!(imported.request, "./comp.st.css");
        assert_eq!(imported.from, PathBuf::from("/src/comp.st.css"));
        assert_eq!(imported.default_export.as_deref(), Some("Comp"));
        assert_eq!(imported.named.get("c").map(String::as_str), Some("b"));

        match meta.symbol("c") {
            Some(Symbol::Import(import)) => {
                assert_eq!(import.imported, ImportedName::Named("b".to_string()))
            }
            other => panic!("unexpected symbol {:?}", other),
        }
        assert!(matches!(meta.symbol("Comp"), Some(Symbol::Import(_))));
    }

    #[test]
    fn test_import_without_from_is_reported() {
        let (meta, diagnostics) = process(":import { -st-default: Comp; }");
        assert!(meta.imports.is_empty());
        assert!(diagnostics.contains(&DiagnosticKind::FromPropertyMissingInImport));
    }

    #[test]
    fn test_unterminated_from_takes_first_string() {
        let (meta, _) = process(
            ":import {\n  -st-from: \"./missing.st.css\"\n  -st-default: Other;\n}",
        );
        assert_eq!(meta.imports[0].request, "./missing.st.css");
        assert_eq!(meta.imports[0].default_export, None);
    }

    #[test]
    fn test_vars_keyframes_namespace_and_custom_selectors() {
        let (meta, _) = process(
            r#"
            @namespace "Main";
            @custom-selector :--heading h1, h2;
            :vars { color1: red; }
            @keyframes slide { from { left: 0 } }
            "#,
        );
        assert_eq!(meta.namespace, "Main");
        assert_eq!(
            meta.custom_selectors.get(":--heading").map(String::as_str),
            Some("h1, h2")
        );
        match meta.symbol("color1") {
            Some(Symbol::Var(var)) => assert_eq!(var.value, "red"),
            other => panic!("unexpected symbol {:?}", other),
        }
        assert_eq!(meta.symbol("slide").map(Symbol::kind), Some(SymbolKind::Keyframes));
    }

    #[test]
    fn test_extends() {
        let (meta, diagnostics) = process(
            r#"
            .a { -st-extends: Comp; }
            .b .c { -st-extends: a; }
            :import { -st-from: "./comp.st.css"; -st-default: Comp; }
            .d { -st-extends: MissingComp; }
            "#,
        );
        assert_eq!(meta.symbol("a").and_then(Symbol::extends), Some("Comp"));
        assert!(diagnostics.contains(&DiagnosticKind::CannotExtendInComplexSelector {
            selector: ".b .c".to_string()
        }));
        assert!(diagnostics.contains(&DiagnosticKind::CannotResolveExtend {
            name: "MissingComp".to_string()
        }));
        assert_eq!(diagnostics.with_code("CANNOT_RESOLVE_EXTEND").count(), 1);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(" \"./a.st.css\" "), "./a.st.css");
        assert_eq!(unquote("'./b.st.css'"), "./b.st.css");
        assert_eq!(unquote("pkg/c.st.css"), "pkg/c.st.css");
    }
}
