//! Mixin composition: extracting the part of a stylesheet that belongs to
//! one class, and inlining such a fragment into a target rule.

use crate::scope::scope_selector;
use stylescope_bundle::MIXIN;
use stylescope_parser::ast::{AtRule, Node, Rule, Stylesheet};
use stylescope_parser::{parse_selector, NodeId, SelectorAst, SelectorKind, SelectorNode, Visit};
use thiserror::Error;

/// Selector of the rule whose declarations go straight into the target
const MIXIN_ROOT_SELECTOR: &str = "&";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixinError {
    /// The target rule has no `-st-mixin` declaration to anchor on
    #[error("missing mixin entry in rule \"{selector}\"")]
    MissingMixinEntry { selector: String },

    #[error("expected a rule at index {index}")]
    NotARule { index: usize },
}

/// Inline `mixin` into the rule at `container[index]`.
///
/// Declarations of the first top-level `&` rule, and bare declarations, are
/// inserted before the target's last `-st-mixin` declaration. Every other
/// rule is scoped against the target selector and, like nested at-rules,
/// inserted after the target as a sibling, in order. Returns how many
/// siblings were inserted.
pub fn merge_rules(
    mixin: Stylesheet,
    container: &mut Vec<Node>,
    index: usize,
) -> Result<usize, MixinError> {
    merge_rules_at(mixin, container, index, index + 1)
}

/// [`merge_rules`] with the siblings inserted from `container[anchor]` on,
/// so several mixins applied to one rule keep their order
pub fn merge_rules_at(
    mut mixin: Stylesheet,
    container: &mut Vec<Node>,
    index: usize,
    anchor: usize,
) -> Result<usize, MixinError> {
    let target = match container.get(index) {
        Some(Node::Rule(rule)) => rule,
        _ => return Err(MixinError::NotARule { index }),
    };
    let target_selector = target.selector.clone();
    let Some(mut entry) = target.position_of_decl(MIXIN) else {
        return Err(MixinError::MissingMixinEntry {
            selector: target_selector.trim().to_string(),
        });
    };

    let root_index = mixin.nodes.iter().position(
        |node| matches!(node, Node::Rule(rule) if rule.selector.trim() == MIXIN_ROOT_SELECTOR),
    );
    for (position, node) in mixin.nodes.iter_mut().enumerate() {
        if Some(position) != root_index {
            scope_rules(node, &target_selector);
        }
    }

    let mut decls = Vec::new();
    let mut siblings = Vec::new();
    for (position, node) in mixin.nodes.into_iter().enumerate() {
        match node {
            Node::Rule(rule) if Some(position) == root_index => collect_decls(rule.nodes, &mut decls),
            Node::Decl(decl) => decls.push(Node::Decl(decl)),
            other => siblings.push(other),
        }
    }

    if let Some(Node::Rule(target)) = container.get_mut(index) {
        for decl in decls {
            target.nodes.insert(entry, decl);
            entry += 1;
        }
    }

    let anchor = anchor.clamp(index + 1, container.len());
    let inserted = siblings.len();
    for (offset, sibling) in siblings.into_iter().enumerate() {
        container.insert(anchor + offset, sibling);
    }
    Ok(inserted)
}

/// Rewrite every rule selector under `node` to be scoped by `scope`
fn scope_rules(node: &mut Node, scope: &str) {
    match node {
        Node::Rule(rule) => {
            rule.selector = scope_selector(scope, &rule.selector, false).selector;
            for child in &mut rule.nodes {
                scope_rules(child, scope);
            }
        }
        Node::AtRule(at_rule) => {
            for child in at_rule.nodes.iter_mut().flatten() {
                scope_rules(child, scope);
            }
        }
        Node::Decl(_) => {}
    }
}

fn collect_decls(nodes: Vec<Node>, out: &mut Vec<Node>) {
    for node in nodes {
        match node {
            Node::Decl(decl) => out.push(Node::Decl(decl)),
            Node::Rule(rule) => collect_decls(rule.nodes, out),
            Node::AtRule(at_rule) => collect_decls(at_rule.nodes.unwrap_or_default(), out),
        }
    }
}

/// Extract the rules of `nodes` that target `prefix` (a single simple
/// selector such as `.ns__button`) as mixin content, with the prefix
/// replaced by `&`.
///
/// With `is_root` every rule is kept after being scoped under the prefix at
/// root level, and non-media at-rules are copied. Otherwise only chunks whose
/// first compound contains the prefix are kept. A first rule whose whole
/// selector is the prefix contributes bare declarations instead of a rule.
pub fn create_class_subset_root(nodes: &[Node], prefix: &str, is_root: bool) -> Vec<Node> {
    let prefix_ast = parse_selector(prefix);
    let Some(prefix_node) = prefix_ast
        .chunks()
        .first()
        .and_then(|chunk| prefix_ast.children(*chunk).first())
        .map(|id| prefix_ast.node(*id).clone())
    else {
        return Vec::new();
    };

    let subset = Subset {
        prefix,
        prefix_node: &prefix_node,
        is_root,
    };
    subset.extract(nodes, true)
}

struct Subset<'a> {
    prefix: &'a str,
    prefix_node: &'a SelectorNode,
    is_root: bool,
}

impl Subset<'_> {
    fn extract(&self, nodes: &[Node], hoist: bool) -> Vec<Node> {
        let mut out = Vec::new();
        let mut add_root_decls = hoist;

        for node in nodes {
            match node {
                Node::Rule(rule) => {
                    let ast = if self.is_root {
                        scope_selector(self.prefix, &rule.selector, true).ast
                    } else {
                        rule.selector_ast()
                    };

                    let matching: Vec<NodeId> = ast
                        .chunks()
                        .iter()
                        .copied()
                        .filter(|chunk| {
                            self.is_root || contains_match_in_first_compound(&ast, *chunk, self.prefix_node)
                        })
                        .collect();
                    if matching.is_empty() {
                        continue;
                    }

                    if add_root_decls && self.is_simple_match(&ast) {
                        add_root_decls = false;
                        let mut decls = Vec::new();
                        collect_decls(rule.nodes.clone(), &mut decls);
                        out.extend(decls);
                        continue;
                    }
                    add_root_decls = false;

                    out.push(Node::Rule(Rule {
                        selector: self.rewrite(&ast, &matching),
                        ..rule.clone()
                    }));
                }
                Node::AtRule(at_rule) if at_rule.name == "media" => {
                    let children = at_rule.nodes.as_deref().unwrap_or_default();
                    let media = self.extract(children, false);
                    if !media.is_empty() {
                        add_root_decls = false;
                        out.push(Node::AtRule(AtRule {
                            nodes: Some(media),
                            ..at_rule.clone()
                        }));
                    }
                }
                Node::AtRule(_) if self.is_root => {
                    add_root_decls = false;
                    out.push(node.clone());
                }
                _ => {}
            }
        }

        out
    }

    /// Selector is exactly one chunk holding only the prefix
    fn is_simple_match(&self, ast: &SelectorAst) -> bool {
        match ast.chunks() {
            [chunk] => match ast.children(*chunk) {
                [only] => ast.node(*only).matches(self.prefix_node),
                _ => false,
            },
            _ => false,
        }
    }

    fn rewrite(&self, ast: &SelectorAst, matching: &[NodeId]) -> String {
        let mut subset = ast.extract_chunks(matching);
        let chunks = subset.chunks().to_vec();
        for chunk in &chunks {
            if !self.is_root {
                fix_chunk_ordering(&mut subset, *chunk, self.prefix_node);
            }
            destructive_replace(&mut subset, *chunk, self.prefix_node);
        }
        if let Some(first) = chunks.first() {
            subset.node_mut(*first).before.clear();
        }
        subset.stringify()
    }
}

/// Whether the prefix occurs in the chunk's first compound selector,
/// outside any nested pseudo-class
fn contains_match_in_first_compound(ast: &SelectorAst, chunk: NodeId, prefix: &SelectorNode) -> bool {
    for id in ast.children(chunk) {
        let node = ast.node(*id);
        if node.is_separator() {
            return false;
        }
        if node.kind != SelectorKind::NestedPseudoClass && node.matches(prefix) {
            return true;
        }
    }
    false
}

/// Move the first prefix match of every compound to the compound's start
fn fix_chunk_ordering(ast: &mut SelectorAst, chunk: NodeId, prefix: &SelectorNode) {
    let mut children = ast.children(chunk).to_vec();
    let mut start = 0;
    let mut moved = false;

    for index in 0..children.len() {
        let node = ast.node(children[index]);
        if node.is_separator() {
            start = index + 1;
            moved = false;
        } else if node.matches(prefix) {
            if !moved && index != start {
                let id = children.remove(index);
                children.insert(start, id);
            }
            moved = true;
        }
    }

    ast.node_mut(chunk).children = children;
}

/// Replace every node matching the prefix, at any depth, with `&`
fn destructive_replace(ast: &mut SelectorAst, chunk: NodeId, prefix: &SelectorNode) {
    ast.walk_from(chunk, |ast, cursor| {
        let node = ast.node_mut(cursor.node);
        if node.matches(prefix) {
            let before = std::mem::take(&mut node.before);
            let after = std::mem::take(&mut node.after);
            *node = SelectorNode {
                before,
                after,
                ..SelectorNode::parent_ref()
            };
            return Visit::SkipChildren;
        }
        Visit::Continue
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylescope_parser::{parse, serialize};

    fn css(nodes: Vec<Node>) -> String {
        serialize(&Stylesheet { path: None, nodes })
    }

    #[test]
    fn test_merge_inlines_root_and_appends_scoped_rules() {
        let mixin = parse("& { color: red; } .x { color: blue; }").unwrap();
        let mut container = parse(".target { -st-mixin: m; }").unwrap().nodes;

        let inserted = merge_rules(mixin, &mut container, 0).unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(
            css(container),
            ".target {\n  color: red;\n  -st-mixin: m;\n}\n.target .x {\n  color: blue;\n}\n"
        );
    }

    #[test]
    fn test_merge_keeps_sibling_order_and_position() {
        let mixin = parse("& { a: 1; } &:hover { b: 2; } @media print { .y { c: 3; } } z: 4;")
            .unwrap();
        let mut container = parse(".t { -st-mixin: m; } .after {}").unwrap().nodes;

        let inserted = merge_rules(mixin, &mut container, 0).unwrap();

        assert_eq!(inserted, 2);
        let output = css(container);
        let hover = output.find(".t:hover").unwrap();
        let media = output.find("@media print").unwrap();
        let after = output.find(".after").unwrap();
        assert!(hover < media && media < after);
        assert!(output.contains(".t .y {"));
        assert!(output.starts_with(".t {\n  a: 1;\n  z: 4;\n  -st-mixin: m;\n}"));
    }

    #[test]
    fn test_merge_without_entry_fails() {
        let mixin = parse("& { color: red; }").unwrap();
        let mut container = parse(".target { color: blue; }").unwrap().nodes;
        assert_eq!(
            merge_rules(mixin, &mut container, 0),
            Err(MixinError::MissingMixinEntry {
                selector: ".target".to_string()
            })
        );
    }

    #[test]
    fn test_subset_hoists_and_replaces_prefix() {
        let source = parse(".a { color: red; } .a .b { color: blue; } .c { color: green; }").unwrap();
        let subset = create_class_subset_root(&source.nodes, ".a", false);

        assert_eq!(css(subset), "color: red;\n& .b {\n  color: blue;\n}\n");
    }

    #[test]
    fn test_subset_round_trip_through_merge() {
        let source = parse(".a { color: red; } .a .b { color: blue; }").unwrap();
        let subset = create_class_subset_root(&source.nodes, ".a", false);

        let mut container = parse(".target { -st-mixin: a; }").unwrap().nodes;
        merge_rules(Stylesheet { path: None, nodes: subset }, &mut container, 0).unwrap();

        assert_eq!(
            css(container),
            ".target {\n  color: red;\n  -st-mixin: a;\n}\n.target .b {\n  color: blue;\n}\n"
        );
    }

    #[test]
    fn test_subset_ignores_matches_outside_first_compound_or_nested() {
        let source = parse(".x .a {} .x:not(.a) {} .b.a:hover {} .a, .z {}").unwrap();
        let subset = create_class_subset_root(&source.nodes, ".a", false);
        let selectors: Vec<_> = subset
            .iter()
            .filter_map(Node::as_rule)
            .map(|rule| rule.selector.clone())
            .collect();
        assert_eq!(selectors, vec!["&.b:hover", "&"]);
    }

    #[test]
    fn test_subset_media_and_other_at_rules() {
        let source = parse(
            "@media (max-width: 10px) { .a { x: 1; } .q { y: 2; } } @media print { .q {} } @keyframes k { from { left: 0 } }",
        )
        .unwrap();

        let subset = create_class_subset_root(&source.nodes, ".a", false);
        assert_eq!(subset.len(), 1);
        match &subset[0] {
            Node::AtRule(media) => {
                assert_eq!(media.params, "(max-width: 10px)");
                let rules: Vec<_> = media.nodes.iter().flatten().filter_map(Node::as_rule).collect();
                assert_eq!(rules.len(), 1);
                assert_eq!(rules[0].selector, "&");
            }
            other => panic!("unexpected node {:?}", other),
        }

        let root_subset = create_class_subset_root(&source.nodes, ".a", true);
        assert!(root_subset
            .iter()
            .any(|node| matches!(node, Node::AtRule(at) if at.name == "keyframes")));
    }

    #[test]
    fn test_root_subset_scopes_everything() {
        let source = parse(".root { color: red; } .label { color: blue; }").unwrap();
        let subset = create_class_subset_root(&source.nodes, ".root", true);
        assert_eq!(css(subset), "color: red;\n& .label {\n  color: blue;\n}\n");
    }
}
