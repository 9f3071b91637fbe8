//! # Selector algebra and mixin composition
//!
//! End-to-end checks of the scoping and mixin primitives, plus the dead
//! rule filter, on parsed stylesheets:
//! - scoping is idempotent at root level
//! - `&` is substituted without a descendant combinator
//! - mixin roots are hoisted into the target rule
//! - a class subset merged into a new rule reproduces the source rules
//! - multi-chunk selectors survive dead rule elimination

use std::collections::BTreeSet;
use std::path::Path;
use stylescope_bundle::{FileProcessor, MemoryFileSystem};
use stylescope_parser::ast::{Node, Stylesheet};
use stylescope_parser::{parse, serialize};
use stylescope_transformer::{
    create_class_subset_root, merge_rules, remove_unused_rules, scope_selector, MixinError,
};

fn selectors(nodes: &[Node]) -> Vec<&str> {
    nodes
        .iter()
        .filter_map(Node::as_rule)
        .map(|rule| rule.selector.as_str())
        .collect()
}

#[test]
fn test_scoping_identical_scope_is_idempotent() {
    let scoped = scope_selector(".btn", ".btn", true);
    assert_eq!(scoped.selector, ".btn");
    assert_eq!(scoped.ast.chunks().len(), 1);
}

#[test]
fn test_parent_reference_vs_descendant() {
    assert_eq!(scope_selector(".bar", "&.foo", false).selector, ".bar.foo");
    assert_eq!(scope_selector(".bar", ".foo", false).selector, ".bar .foo");
}

#[test]
fn test_mixin_hoisting() {
    let mixin = parse("& { color: red; } .x { color: blue; }").unwrap();
    let mut nodes = parse(".target { -st-mixin: m; }").unwrap().nodes;

    merge_rules(mixin, &mut nodes, 0).unwrap();

    assert_eq!(selectors(&nodes), vec![".target", ".target .x"]);
    let target = nodes[0].as_rule().unwrap();
    let props: Vec<_> = target.decls().map(|decl| decl.prop.as_str()).collect();
    assert_eq!(props, vec!["color", "-st-mixin"]);
}

#[test]
fn test_class_subset_round_trip() {
    let source = parse(".a { color: red; } .a .b { color: blue; }").unwrap();
    let subset = create_class_subset_root(&source.nodes, ".a", false);

    assert!(matches!(&subset[0], Node::Decl(decl) if decl.value == "red"));
    assert_eq!(selectors(&subset), vec!["& .b"]);

    let mut nodes = parse(".target { -st-mixin: a; }").unwrap().nodes;
    merge_rules(
        Stylesheet {
            path: None,
            nodes: subset,
        },
        &mut nodes,
        0,
    )
    .unwrap();

    if let Node::Rule(rule) = &mut nodes[0] {
        rule.nodes.retain(|node| node.as_decl().map_or(true, |d| d.prop != "-st-mixin"));
    }
    let expected = parse(".target { color: red; } .target .b { color: blue; }").unwrap();
    assert_eq!(
        serialize(&Stylesheet { path: None, nodes }),
        serialize(&expected)
    );
}

#[test]
fn test_merge_requires_mixin_entry() {
    let mixin = parse("& { color: red; }").unwrap();
    let mut nodes = parse(".a {} .b { -st-mixin: m; }").unwrap().nodes;
    assert!(matches!(
        merge_rules(mixin.clone(), &mut nodes, 0),
        Err(MixinError::MissingMixinEntry { .. })
    ));
    assert_eq!(merge_rules(mixin, &mut nodes, 1), Ok(0));
}

#[test]
fn test_dead_rule_compound_guard() {
    let fs = MemoryFileSystem::with_files([
        (
            "/main.st.css",
            r#"
            :import { -st-from: "./imported.st.css"; -st-default: Imported; }
            .Imported, .Other { color: red; }
            .Imported { color: blue; }
            "#,
        ),
        ("/imported.st.css", ".root {}"),
    ]);
    let meta = FileProcessor::new(fs)
        .process(Path::new("/main.st.css"))
        .unwrap();

    let mut nodes = meta.ast.nodes.clone();
    let used = BTreeSet::from([Path::new("/main.st.css").to_path_buf()]);
    remove_unused_rules(&mut nodes, &meta, &meta.imports[0], &used);

    assert_eq!(selectors(&nodes), vec![":import", ".Imported, .Other"]);
}
