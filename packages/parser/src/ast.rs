use crate::selector::{parse_selector, SelectorAst};
use serde::{Deserialize, Serialize};

/// Span information for source location tracking (byte offsets into the file)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span used for nodes synthesized by the compiler
    pub fn synthetic() -> Self {
        Self::default()
    }
}

/// Root of a parsed stylesheet
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stylesheet {
    /// Origin path attached by the parser, used for diagnostics
    pub path: Option<String>,
    pub nodes: Vec<Node>,
}

/// A statement inside a stylesheet, rule, or at-rule block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    Rule(Rule),
    Decl(Declaration),
    AtRule(AtRule),
}

/// Style rule (`selector { ... }`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub selector: String,
    pub nodes: Vec<Node>,
    pub span: Span,
}

/// Declaration (`prop: value`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub prop: String,
    pub value: String,
    pub span: Span,
}

/// At-rule (`@name params;` or `@name params { ... }`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtRule {
    pub name: String,
    pub params: String,
    pub nodes: Option<Vec<Node>>,
    pub span: Span,
}

impl Stylesheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            nodes: Vec::new(),
        }
    }

    pub fn append(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level rules only
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.nodes.iter().filter_map(Node::as_rule)
    }
}

impl Node {
    pub fn as_rule(&self) -> Option<&Rule> {
        match self {
            Node::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn as_rule_mut(&mut self) -> Option<&mut Rule> {
        match self {
            Node::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn as_decl(&self) -> Option<&Declaration> {
        match self {
            Node::Decl(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Rule(rule) => rule.span,
            Node::Decl(decl) => decl.span,
            Node::AtRule(at_rule) => at_rule.span,
        }
    }
}

impl Rule {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            nodes: Vec::new(),
            span: Span::synthetic(),
        }
    }

    /// Parse the selector on demand.
    ///
    /// The AST is never cached on the rule: the selector string is the source
    /// of truth, so rewriting `selector` can never leave a stale tree behind.
    pub fn selector_ast(&self) -> SelectorAst {
        parse_selector(&self.selector)
    }

    pub fn with_decl(mut self, prop: &str, value: &str) -> Self {
        self.nodes.push(Node::Decl(Declaration::new(prop, value)));
        self
    }

    pub fn decls(&self) -> impl Iterator<Item = &Declaration> {
        self.nodes.iter().filter_map(Node::as_decl)
    }

    /// Last declaration with the given property (later declarations win)
    pub fn find_decl(&self, prop: &str) -> Option<&Declaration> {
        self.decls().filter(|decl| decl.prop == prop).last()
    }

    /// Index of the last declaration with the given property
    pub fn position_of_decl(&self, prop: &str) -> Option<usize> {
        self.nodes
            .iter()
            .rposition(|node| matches!(node, Node::Decl(decl) if decl.prop == prop))
    }
}

impl Declaration {
    pub fn new(prop: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            prop: prop.into(),
            value: value.into(),
            span: Span::synthetic(),
        }
    }
}

impl AtRule {
    pub fn new(name: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: params.into(),
            nodes: None,
            span: Span::synthetic(),
        }
    }

    /// Create an at-rule with an (initially empty) block
    pub fn block(name: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            nodes: Some(Vec::new()),
            ..Self::new(name, params)
        }
    }

    pub fn has_children(&self) -> bool {
        self.nodes.as_ref().is_some_and(|nodes| !nodes.is_empty())
    }
}
