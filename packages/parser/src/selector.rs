//! # Selector AST
//!
//! Selectors are stored in a small arena: every node lives in
//! `SelectorAst::nodes` and refers to its children by [`NodeId`]. Cloning a
//! subtree copies nodes into the arena instead of duplicating a pointer graph,
//! and replacing a node is a splice on its parent's child list.
//!
//! Shape of a parsed selector list:
//!
//! ```text
//! Selectors
//! ├── Selector            ".a > .b"
//! │   ├── Class(a)
//! │   ├── Operator(>)     before " ", after " "
//! │   └── Class(b)
//! └── Selector            " &:hover"   (before = " ")
//!     ├── Invalid(&)
//!     └── PseudoClass(hover)
//! ```
//!
//! A chunk's children alternate between compound parts and `Operator` /
//! `Spacing` separators. `Invalid` with name `&` is the parent-reference
//! placeholder; it has to be substituted before the selector is emitted.

use logos::Logos;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Index of a node inside its [`SelectorAst`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectorKind {
    /// Comma separated list (root)
    Selectors,
    /// One chunk of the list
    Selector,
    Class,
    Id,
    Element,
    Universal,
    Attribute,
    PseudoClass,
    PseudoElement,
    NestedPseudoClass,
    Operator,
    Spacing,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorNode {
    pub kind: SelectorKind,
    /// Identifier for named nodes, the combinator for operators, the raw
    /// text for spacing and invalid nodes, the inner text for attributes
    pub name: String,
    /// Argument of a functional pseudo-class such as `:nth-child(2n)`
    pub content: Option<String>,
    pub before: String,
    pub after: String,
    pub children: Vec<NodeId>,
}

impl SelectorNode {
    pub fn new(kind: SelectorKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            content: None,
            before: String::new(),
            after: String::new(),
            children: Vec::new(),
        }
    }

    /// The `&` placeholder
    pub fn parent_ref() -> Self {
        Self::new(SelectorKind::Invalid, "&")
    }

    pub fn spacing(value: &str) -> Self {
        Self::new(SelectorKind::Spacing, value)
    }

    pub fn is_parent_ref(&self) -> bool {
        self.kind == SelectorKind::Invalid && self.name == "&"
    }

    pub fn is_separator(&self) -> bool {
        matches!(self.kind, SelectorKind::Operator | SelectorKind::Spacing)
    }

    /// Same kind and name (used for prefix matching)
    pub fn matches(&self, other: &SelectorNode) -> bool {
        self.kind == other.kind && self.name == other.name
    }
}

/// Result of a visit callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Descend into the node's children
    Continue,
    /// Do not descend into this node
    SkipChildren,
    /// End the whole traversal
    Stop,
}

/// Position of the visited node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub node: NodeId,
    pub parent: Option<NodeId>,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorAst {
    nodes: Vec<SelectorNode>,
    root: NodeId,
}

impl Default for SelectorAst {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectorAst {
    /// An empty selector list
    pub fn new() -> Self {
        Self {
            nodes: vec![SelectorNode::new(SelectorKind::Selectors, "")],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &SelectorNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SelectorNode {
        &mut self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Top-level comma separated chunks
    pub fn chunks(&self) -> &[NodeId] {
        self.children(self.root)
    }

    pub fn set_chunks(&mut self, chunks: Vec<NodeId>) {
        let root = self.root;
        self.nodes[root.0].children = chunks;
    }

    pub fn alloc(&mut self, node: SelectorNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn push_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
    }

    /// Replace `parent.children[index]` with `replacement`
    pub fn splice(&mut self, parent: NodeId, index: usize, replacement: Vec<NodeId>) {
        self.nodes[parent.0]
            .children
            .splice(index..=index, replacement);
    }

    /// Deep copy a subtree of this arena
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let mut node = self.nodes[id.0].clone();
        node.children = node
            .children
            .iter()
            .map(|child| self.clone_subtree(*child))
            .collect();
        self.alloc(node)
    }

    /// Deep copy a subtree of another arena into this one
    pub fn import(&mut self, other: &SelectorAst, id: NodeId) -> NodeId {
        let mut node = other.nodes[id.0].clone();
        node.children = node
            .children
            .iter()
            .map(|child| self.import(other, *child))
            .collect();
        self.alloc(node)
    }

    /// Attribute-wise structural comparison of two subtrees
    pub fn subtree_eq(&self, id: NodeId, other: &SelectorAst, other_id: NodeId) -> bool {
        let a = self.node(id);
        let b = other.node(other_id);
        a.kind == b.kind
            && a.name == b.name
            && a.content == b.content
            && a.before == b.before
            && a.after == b.after
            && a.children.len() == b.children.len()
            && a
                .children
                .iter()
                .zip(&b.children)
                .all(|(x, y)| self.subtree_eq(*x, other, *y))
    }

    /// Depth-first traversal starting at the root.
    ///
    /// The visitor may mutate the tree through the `&mut SelectorAst` it
    /// receives; mutations are visible to the rest of the same walk.
    pub fn walk<F>(&mut self, visit: F)
    where
        F: FnMut(&mut SelectorAst, Cursor) -> Visit,
    {
        let root = self.root;
        self.walk_from(root, visit);
    }

    /// Depth-first traversal of the subtree at `start` (the start node is
    /// visited first)
    pub fn walk_from<F>(&mut self, start: NodeId, mut visit: F)
    where
        F: FnMut(&mut SelectorAst, Cursor) -> Visit,
    {
        let cursor = Cursor {
            node: start,
            parent: None,
            index: 0,
        };
        self.walk_node(cursor, &mut visit);
    }

    fn walk_node<F>(&mut self, cursor: Cursor, visit: &mut F) -> Visit
    where
        F: FnMut(&mut SelectorAst, Cursor) -> Visit,
    {
        match visit(self, cursor) {
            Visit::Stop => return Visit::Stop,
            Visit::SkipChildren => return Visit::Continue,
            Visit::Continue => {}
        }

        // The visitor may have replaced the node in its parent
        let id = match cursor.parent {
            Some(parent) => match self.nodes[parent.0].children.get(cursor.index) {
                Some(id) => *id,
                None => return Visit::Continue,
            },
            None => cursor.node,
        };

        let mut index = 0;
        while index < self.nodes[id.0].children.len() {
            let child = Cursor {
                node: self.nodes[id.0].children[index],
                parent: Some(id),
                index,
            };
            if self.walk_node(child, visit) == Visit::Stop {
                return Visit::Stop;
            }
            index += 1;
        }

        Visit::Continue
    }

    /// Read-only depth-first traversal
    pub fn for_each<F>(&self, id: NodeId, visit: &mut F) -> Visit
    where
        F: FnMut(&SelectorNode, NodeId) -> Visit,
    {
        match visit(self.node(id), id) {
            Visit::Stop => return Visit::Stop,
            Visit::SkipChildren => return Visit::Continue,
            Visit::Continue => {}
        }
        for child in self.children(id) {
            if self.for_each(*child, visit) == Visit::Stop {
                return Visit::Stop;
            }
        }
        Visit::Continue
    }

    /// New arena holding only the given chunks of this one
    pub fn extract_chunks(&self, chunks: &[NodeId]) -> SelectorAst {
        let mut ast = SelectorAst::new();
        let root = ast.root();
        for chunk in chunks {
            let id = ast.import(self, *chunk);
            ast.push_child(root, id);
        }
        ast
    }

    pub fn stringify(&self) -> String {
        self.stringify_node(self.root)
    }

    pub fn stringify_node(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_list(&self, ids: &[NodeId], out: &mut String) {
        for (index, id) in ids.iter().enumerate() {
            if index > 0 {
                out.push(',');
            }
            self.write_node(*id, out);
        }
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        out.push_str(&node.before);
        match node.kind {
            SelectorKind::Selectors => self.write_list(&node.children, out),
            SelectorKind::Selector => {
                for child in &node.children {
                    self.write_node(*child, out);
                }
            }
            SelectorKind::Class => {
                out.push('.');
                out.push_str(&node.name);
            }
            SelectorKind::Id => {
                out.push('#');
                out.push_str(&node.name);
            }
            SelectorKind::Element
            | SelectorKind::Universal
            | SelectorKind::Operator
            | SelectorKind::Spacing
            | SelectorKind::Invalid => out.push_str(&node.name),
            SelectorKind::Attribute => {
                out.push('[');
                out.push_str(&node.name);
                out.push(']');
            }
            SelectorKind::PseudoClass => {
                out.push(':');
                out.push_str(&node.name);
                if let Some(content) = &node.content {
                    out.push('(');
                    out.push_str(content);
                    out.push(')');
                }
            }
            SelectorKind::PseudoElement => {
                out.push_str("::");
                out.push_str(&node.name);
            }
            SelectorKind::NestedPseudoClass => {
                out.push(':');
                out.push_str(&node.name);
                out.push('(');
                self.write_list(&node.children, out);
                out.push(')');
            }
        }
        out.push_str(&node.after);
    }
}

/// Pseudo-classes whose argument is itself a selector list
const NESTED_PSEUDO_CLASSES: &[&str] = &["not", "matches", "is", "where", "has", "any", "-webkit-any"];

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum SelectorToken<'src> {
    #[regex(r"\.-?[_a-zA-Z][_a-zA-Z0-9-]*", |lex| &lex.slice()[1..])]
    Class(&'src str),

    #[regex(r"#[_a-zA-Z0-9-]+", |lex| &lex.slice()[1..])]
    Id(&'src str),

    #[regex(r"-?[_a-zA-Z][_a-zA-Z0-9-]*", |lex| lex.slice())]
    #[regex(r"--[_a-zA-Z0-9-]*", |lex| lex.slice())]
    Ident(&'src str),

    #[token("*")]
    Star,

    #[regex(r"\[[^\]]*\]", |lex| { let s = lex.slice(); &s[1..s.len() - 1] })]
    Attribute(&'src str),

    #[token("::")]
    DoubleColon,

    #[token(":")]
    Colon,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(",")]
    Comma,

    #[regex(r"[ \t\r\n\f]*[>+~][ \t\r\n\f]*", |lex| lex.slice())]
    Combinator(&'src str),

    #[regex(r"[ \t\r\n\f]+", |lex| lex.slice())]
    Whitespace(&'src str),

    #[token("&")]
    Amp,
}

/// `None` marks text the lexer could not classify
type Lexed<'src> = (Option<SelectorToken<'src>>, Range<usize>);

struct SelectorParser<'src> {
    source: &'src str,
    tokens: Vec<Lexed<'src>>,
    pos: usize,
    ast: SelectorAst,
}

/// Parse a selector list. Parsing never fails: unrecognized input becomes
/// `Invalid` nodes that serialize back verbatim.
pub fn parse_selector(source: &str) -> SelectorAst {
    let mut lexer = SelectorToken::lexer(source);
    let mut tokens: Vec<Lexed> = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match (result, tokens.last_mut()) {
            (Ok(token), _) => tokens.push((Some(token), span)),
            // Merge runs of unknown characters into one invalid node
            (Err(()), Some((None, last))) if last.end == span.start => last.end = span.end,
            (Err(()), _) => tokens.push((None, span)),
        }
    }

    let mut parser = SelectorParser {
        source,
        tokens,
        pos: 0,
        ast: SelectorAst::new(),
    };
    let chunks = parser.parse_list(false);
    parser.ast.set_chunks(chunks);
    parser.ast
}

impl<'src> SelectorParser<'src> {
    fn peek(&self) -> Option<&Lexed<'src>> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<SelectorToken<'src>> {
        self.peek().and_then(|(token, _)| *token)
    }

    fn at_list_end(&self, nested: bool) -> bool {
        match self.peek() {
            None => true,
            Some((Some(SelectorToken::RParen), _)) => nested,
            _ => false,
        }
    }

    fn parse_list(&mut self, nested: bool) -> Vec<NodeId> {
        let mut chunks = vec![self.parse_chunk(nested)];
        while let Some(SelectorToken::Comma) = self.peek_token() {
            self.pos += 1;
            chunks.push(self.parse_chunk(nested));
        }
        chunks
    }

    fn parse_chunk(&mut self, nested: bool) -> NodeId {
        let source = self.source;
        let chunk = self.ast.alloc(SelectorNode::new(SelectorKind::Selector, ""));

        while !self.at_list_end(nested) {
            let Some((token, span)) = self.peek().cloned() else {
                break;
            };
            let text = &source[span.clone()];
            self.pos += 1;

            let node = match token {
                Some(SelectorToken::Comma) => {
                    self.pos -= 1;
                    break;
                }
                Some(SelectorToken::Whitespace(ws)) => {
                    let has_children = !self.ast.children(chunk).is_empty();
                    let ends_chunk = matches!(self.peek_token(), Some(SelectorToken::Comma))
                        || self.at_list_end(nested);
                    if ends_chunk {
                        self.ast.node_mut(chunk).after.push_str(ws);
                        continue;
                    }
                    if !has_children {
                        self.ast.node_mut(chunk).before.push_str(ws);
                        continue;
                    }
                    SelectorNode::spacing(ws)
                }
                Some(SelectorToken::Combinator(raw)) => {
                    let trimmed = raw.trim();
                    let start = raw.find(trimmed).unwrap_or(0);
                    let mut node = SelectorNode::new(SelectorKind::Operator, trimmed);
                    node.before = raw[..start].to_string();
                    node.after = raw[start + trimmed.len()..].to_string();
                    node
                }
                Some(SelectorToken::Class(name)) => SelectorNode::new(SelectorKind::Class, name),
                Some(SelectorToken::Id(name)) => SelectorNode::new(SelectorKind::Id, name),
                Some(SelectorToken::Ident(name)) => SelectorNode::new(SelectorKind::Element, name),
                Some(SelectorToken::Star) => SelectorNode::new(SelectorKind::Universal, "*"),
                Some(SelectorToken::Attribute(inner)) => {
                    SelectorNode::new(SelectorKind::Attribute, inner)
                }
                Some(SelectorToken::Amp) => SelectorNode::parent_ref(),
                Some(SelectorToken::DoubleColon) => match self.peek_token() {
                    Some(SelectorToken::Ident(name)) => {
                        self.pos += 1;
                        SelectorNode::new(SelectorKind::PseudoElement, name)
                    }
                    _ => SelectorNode::new(SelectorKind::Invalid, text),
                },
                Some(SelectorToken::Colon) => match self.peek_token() {
                    Some(SelectorToken::Ident(name)) => {
                        self.pos += 1;
                        let id = self.parse_pseudo_class(name);
                        self.ast.push_child(chunk, id);
                        continue;
                    }
                    _ => SelectorNode::new(SelectorKind::Invalid, text),
                },
                Some(SelectorToken::LParen) | Some(SelectorToken::RParen) | None => {
                    SelectorNode::new(SelectorKind::Invalid, text)
                }
            };

            let id = self.ast.alloc(node);
            self.ast.push_child(chunk, id);
        }

        chunk
    }

    fn parse_pseudo_class(&mut self, name: &str) -> NodeId {
        if self.peek_token() != Some(SelectorToken::LParen) {
            return self.ast.alloc(SelectorNode::new(SelectorKind::PseudoClass, name));
        }
        self.pos += 1;

        if NESTED_PSEUDO_CLASSES.contains(&name) {
            let mut node = SelectorNode::new(SelectorKind::NestedPseudoClass, name);
            node.children = self.parse_list(true);
            if self.peek_token() == Some(SelectorToken::RParen) {
                self.pos += 1;
            }
            return self.ast.alloc(node);
        }

        // Raw argument, e.g. `:nth-child(2n + 1)`: slice the source up to the
        // matching parenthesis
        let start = self.peek().map(|(_, span)| span.start).unwrap_or(self.source.len());
        let mut end = self.source.len();
        let mut depth = 1;
        while let Some((token, span)) = self.peek().cloned() {
            self.pos += 1;
            match token {
                Some(SelectorToken::LParen) => depth += 1,
                Some(SelectorToken::RParen) => {
                    depth -= 1;
                    if depth == 0 {
                        end = span.start;
                        break;
                    }
                }
                _ => {}
            }
        }
        let mut node = SelectorNode::new(SelectorKind::PseudoClass, name);
        node.content = Some(self.source[start..end.max(start)].to_string());
        self.ast.alloc(node)
    }
}

/// Serialize a selector AST
pub fn stringify_selector(ast: &SelectorAst) -> String {
    ast.stringify()
}
