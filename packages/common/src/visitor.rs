use stylescope_parser::ast::*;

/// Visitor pattern for traversing stylesheet nodes immutably
///
/// This trait provides default implementations that walk the entire tree.
/// Override specific visit_* methods to perform custom actions on nodes.
pub trait Visitor: Sized {
    fn visit_stylesheet(&mut self, sheet: &Stylesheet) {
        walk_nodes(self, &sheet.nodes);
    }

    fn visit_rule(&mut self, rule: &Rule) {
        walk_nodes(self, &rule.nodes);
    }

    fn visit_decl(&mut self, _decl: &Declaration) {
        // Leaf node, no children to walk
    }

    fn visit_at_rule(&mut self, at_rule: &AtRule) {
        walk_at_rule(self, at_rule);
    }
}

/// Mutable visitor pattern for transforming stylesheet nodes
///
/// Similar to Visitor, but provides mutable access to nodes.
/// Use this when you need to modify the AST during traversal.
pub trait VisitorMut: Sized {
    fn visit_stylesheet_mut(&mut self, sheet: &mut Stylesheet) {
        walk_nodes_mut(self, &mut sheet.nodes);
    }

    fn visit_rule_mut(&mut self, rule: &mut Rule) {
        walk_nodes_mut(self, &mut rule.nodes);
    }

    fn visit_decl_mut(&mut self, _decl: &mut Declaration) {
        // Leaf node, no children to walk
    }

    fn visit_at_rule_mut(&mut self, at_rule: &mut AtRule) {
        walk_at_rule_mut(self, at_rule);
    }
}

// Default walk implementations for immutable visitor

pub fn walk_nodes<V: Visitor>(visitor: &mut V, nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Rule(rule) => visitor.visit_rule(rule),
            Node::Decl(decl) => visitor.visit_decl(decl),
            Node::AtRule(at_rule) => visitor.visit_at_rule(at_rule),
        }
    }
}

pub fn walk_at_rule<V: Visitor>(visitor: &mut V, at_rule: &AtRule) {
    if let Some(nodes) = &at_rule.nodes {
        walk_nodes(visitor, nodes);
    }
}

// Default walk implementations for mutable visitor

pub fn walk_nodes_mut<V: VisitorMut>(visitor: &mut V, nodes: &mut [Node]) {
    for node in nodes {
        match node {
            Node::Rule(rule) => visitor.visit_rule_mut(rule),
            Node::Decl(decl) => visitor.visit_decl_mut(decl),
            Node::AtRule(at_rule) => visitor.visit_at_rule_mut(at_rule),
        }
    }
}

pub fn walk_at_rule_mut<V: VisitorMut>(visitor: &mut V, at_rule: &mut AtRule) {
    if let Some(nodes) = &mut at_rule.nodes {
        walk_nodes_mut(visitor, nodes);
    }
}

/// Remove every rule (at any depth) for which `keep` returns false
pub fn retain_rules<F>(nodes: &mut Vec<Node>, keep: &mut F)
where
    F: FnMut(&Rule) -> bool,
{
    nodes.retain(|node| match node {
        Node::Rule(rule) => keep(rule),
        _ => true,
    });
    for node in nodes.iter_mut() {
        match node {
            Node::Rule(rule) => retain_rules(&mut rule.nodes, keep),
            Node::AtRule(at_rule) => {
                if let Some(children) = &mut at_rule.nodes {
                    retain_rules(children, keep);
                }
            }
            Node::Decl(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylescope_parser::parse;

    struct SelectorCollector(Vec<String>);

    impl Visitor for SelectorCollector {
        fn visit_rule(&mut self, rule: &Rule) {
            self.0.push(rule.selector.clone());
            walk_nodes(self, &rule.nodes);
        }
    }

    struct Uppercase;

    impl VisitorMut for Uppercase {
        fn visit_decl_mut(&mut self, decl: &mut Declaration) {
            decl.value = decl.value.to_uppercase();
        }
    }

    #[test]
    fn test_visitor_reaches_rules_inside_at_rules() {
        let sheet = parse(".a {} @media screen { .b {} @supports (x: y) { .c {} } }").unwrap();
        let mut collector = SelectorCollector(Vec::new());
        collector.visit_stylesheet(&sheet);
        assert_eq!(collector.0, vec![".a", ".b", ".c"]);
    }

    #[test]
    fn test_visitor_mut_rewrites_declarations() {
        let mut sheet = parse(".a { color: red } @media print { .b { color: blue } }").unwrap();
        Uppercase.visit_stylesheet_mut(&mut sheet);
        let css = stylescope_parser::serialize(&sheet);
        assert!(css.contains("color: RED;"));
        assert!(css.contains("color: BLUE;"));
    }

    #[test]
    fn test_retain_rules_is_recursive() {
        let mut sheet = parse(".a {} .drop {} @media screen { .drop {} .b {} }").unwrap();
        retain_rules(&mut sheet.nodes, &mut |rule: &Rule| rule.selector != ".drop");
        let mut collector = SelectorCollector(Vec::new());
        collector.visit_stylesheet(&sheet);
        assert_eq!(collector.0, vec![".a", ".b"]);
    }
}
