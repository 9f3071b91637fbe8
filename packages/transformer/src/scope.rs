use stylescope_parser::{parse_selector, NodeId, SelectorAst, SelectorKind, SelectorNode, Visit};

/// Result of [`scope_selector`]
#[derive(Debug, Clone)]
pub struct ScopedSelector {
    pub selector: String,
    pub ast: SelectorAst,
}

/// Constrain `target` to elements inside `scope`.
///
/// Every (target chunk, scope chunk) pair produces one output chunk. A chunk
/// starting with `&` only gets its placeholders substituted; otherwise the
/// scope is prepended with a descendant combinator, unless
/// `root_scope_level` is set and the chunk already starts with the scope.
pub fn scope_selector(scope: &str, target: &str, root_scope_level: bool) -> ScopedSelector {
    let ast = scope_selector_ast(
        &parse_selector(scope),
        &parse_selector(target),
        root_scope_level,
    );
    ScopedSelector {
        selector: ast.stringify(),
        ast,
    }
}

/// [`scope_selector`] over already parsed selectors
pub fn scope_selector_ast(
    scope: &SelectorAst,
    target: &SelectorAst,
    root_scope_level: bool,
) -> SelectorAst {
    let mut out = SelectorAst::new();
    if is_blank(scope) || is_blank(target) {
        return out;
    }

    let root = out.root();
    for &target_chunk in target.chunks() {
        for &scope_chunk in scope.chunks() {
            let chunk = out.import(target, target_chunk);

            let scope_before = &scope.node(scope_chunk).before;
            if !scope_before.is_empty() {
                out.node_mut(chunk).before = scope_before.clone();
            }

            let prepend = match out.children(chunk).first() {
                Some(&first) => {
                    let node = out.node(first);
                    !node.is_parent_ref()
                        && node.kind != SelectorKind::Spacing
                        && !(root_scope_level && starts_with(&out, chunk, scope, scope_chunk))
                }
                None => false,
            };

            if prepend {
                let mut prefix: Vec<NodeId> = scope
                    .children(scope_chunk)
                    .iter()
                    .map(|id| out.import(scope, *id))
                    .collect();
                prefix.push(out.alloc(SelectorNode::spacing(" ")));
                out.node_mut(chunk).children.splice(0..0, prefix);
            }

            replace_parent_refs(&mut out, chunk, scope, scope_chunk);
            out.push_child(root, chunk);
        }
    }

    out
}

/// Substitute every `&` under `chunk` with a copy of the scope chunk's nodes
pub(crate) fn replace_parent_refs(
    out: &mut SelectorAst,
    chunk: NodeId,
    scope: &SelectorAst,
    scope_chunk: NodeId,
) {
    out.walk_from(chunk, |ast, cursor| {
        if !ast.node(cursor.node).is_parent_ref() {
            return Visit::Continue;
        }
        if let Some(parent) = cursor.parent {
            let replacement = scope
                .children(scope_chunk)
                .iter()
                .map(|id| ast.import(scope, *id))
                .collect();
            ast.splice(parent, cursor.index, replacement);
        }
        Visit::SkipChildren
    });
}

/// Whether the chunk's leading nodes are structurally equal to the scope
/// chunk's nodes
fn starts_with(out: &SelectorAst, chunk: NodeId, scope: &SelectorAst, scope_chunk: NodeId) -> bool {
    let prefix = scope.children(scope_chunk);
    let nodes = out.children(chunk);
    nodes.len() >= prefix.len()
        && prefix
            .iter()
            .zip(nodes)
            .all(|(expected, actual)| out.subtree_eq(*actual, scope, *expected))
}

fn is_blank(ast: &SelectorAst) -> bool {
    ast.chunks()
        .iter()
        .all(|chunk| ast.children(*chunk).is_empty())
}
