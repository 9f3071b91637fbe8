use std::collections::BTreeMap;
use stylescope_parser::{parse_selector, NodeId, SelectorAst, SelectorKind};

/// Custom selectors may refer to each other; expansion stops after this many
/// rounds
const MAX_EXPANSION_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum Expansion {
    /// The selector uses no custom selector
    Unchanged,
    Expanded(String),
    /// A `:--name` without a matching `@custom-selector`
    Unknown { name: String },
}

/// Replace every top-level `:--name` in `selector` with the selector list
/// it was declared as. A chunk using a custom selector with `n`
/// alternatives becomes `n` chunks.
pub fn expand_custom_selectors(selector: &str, custom: &BTreeMap<String, String>) -> Expansion {
    let ast = parse_selector(selector);
    let mut chunks: Vec<String> = ast
        .chunks()
        .iter()
        .map(|chunk| ast.stringify_node(*chunk).trim().to_string())
        .collect();
    let mut expanded = false;

    for _ in 0..MAX_EXPANSION_DEPTH {
        let mut next = Vec::with_capacity(chunks.len());
        let mut changed = false;

        for chunk in &chunks {
            let ast = parse_selector(chunk);
            let Some((chunk_id, index, name)) = find_custom(&ast) else {
                next.push(chunk.clone());
                continue;
            };
            let Some(alternatives) = custom.get(&name) else {
                return Expansion::Unknown { name };
            };

            changed = true;
            let alternatives = parse_selector(alternatives);
            for alternative in alternatives.chunks() {
                let mut copy = ast.extract_chunks(&[chunk_id]);
                let target = copy.chunks()[0];
                let replacement = alternatives
                    .children(*alternative)
                    .iter()
                    .map(|id| copy.import(&alternatives, *id))
                    .collect();
                copy.splice(target, index, replacement);
                next.push(copy.stringify().trim().to_string());
            }
        }

        chunks = next;
        if !changed {
            break;
        }
        expanded = true;
    }

    if expanded {
        Expansion::Expanded(chunks.join(", "))
    } else {
        Expansion::Unchanged
    }
}

/// First top-level custom selector reference: (chunk, child index, `:--name`)
fn find_custom(ast: &SelectorAst) -> Option<(NodeId, usize, String)> {
    let chunk = *ast.chunks().first()?;
    ast.children(chunk).iter().enumerate().find_map(|(index, id)| {
        let node = ast.node(*id);
        (node.kind == SelectorKind::PseudoClass && node.name.starts_with("--"))
            .then(|| (chunk, index, format!(":{}", node.name)))
    })
}
