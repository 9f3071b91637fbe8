use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::tokenizer::{tokenize, Token};
use std::ops::Range;

/// Open block on the parser stack
enum Frame {
    Rule(Rule),
    AtRule(AtRule),
}

impl Frame {
    fn nodes_mut(&mut self) -> &mut Vec<Node> {
        match self {
            Frame::Rule(rule) => &mut rule.nodes,
            Frame::AtRule(at_rule) => at_rule.nodes.get_or_insert_with(Vec::new),
        }
    }

    fn close(self, end: usize) -> Node {
        match self {
            Frame::Rule(mut rule) => {
                rule.span.end = end;
                Node::Rule(rule)
            }
            Frame::AtRule(mut at_rule) => {
                at_rule.span.end = end;
                if at_rule.nodes.is_none() {
                    at_rule.nodes = Some(Vec::new());
                }
                Node::AtRule(at_rule)
            }
        }
    }
}

/// Pending raw text between two structural tokens
#[derive(Default)]
struct Buffer {
    text: String,
    start: Option<usize>,
    end: usize,
    paren_depth: i32,
}

impl Buffer {
    fn push(&mut self, text: &str, range: &Range<usize>) {
        self.push_raw(text, range);
        for ch in text.chars() {
            match ch {
                '(' => self.paren_depth += 1,
                ')' => self.paren_depth -= 1,
                _ => {}
            }
        }
    }

    /// Push text that never affects parenthesis nesting (quoted strings)
    fn push_raw(&mut self, text: &str, range: &Range<usize>) {
        if self.start.is_none() && !text.trim().is_empty() {
            self.start = Some(range.start + (text.len() - text.trim_start().len()));
        }
        if self.start.is_some() {
            self.text.push_str(text);
            self.end = range.end;
        }
    }

    fn in_parens(&self) -> bool {
        self.paren_depth > 0
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    fn take(&mut self) -> (String, Span) {
        let text = std::mem::take(&mut self.text);
        let span = Span::new(self.start.unwrap_or(self.end), self.end);
        *self = Buffer::default();
        (text.trim().to_string(), span)
    }
}

/// Parser for stylesheets
pub struct Parser<'src> {
    tokens: Vec<(Token<'src>, Range<usize>)>,
    source_len: usize,
    path: Option<String>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> ParseResult<Self> {
        let tokens =
            tokenize(source).map_err(|range| ParseError::lexer_error(range.start))?;
        Ok(Self {
            tokens,
            source_len: source.len(),
            path: None,
        })
    }

    /// Attach the origin path to the produced stylesheet
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Parse a complete stylesheet
    pub fn parse_stylesheet(self) -> ParseResult<Stylesheet> {
        let mut root = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut buffer = Buffer::default();

        for (token, range) in &self.tokens {
            match token {
                Token::Comment(_) => {}
                Token::Text(text) => buffer.push(text, range),
                Token::String(text) => buffer.push_raw(text, range),
                Token::Slash => buffer.push_raw("/", range),
                Token::Semicolon if buffer.in_parens() => buffer.push(";", range),
                Token::Semicolon => {
                    if !buffer.is_blank() {
                        let (text, span) = buffer.take();
                        let node = statement(&text, span)?;
                        current_nodes(&mut stack, &mut root).push(node);
                    } else {
                        buffer.take();
                    }
                }
                Token::LBrace => {
                    let (prelude, mut span) = buffer.take();
                    if span.start == span.end {
                        span = Span::new(range.start, range.start);
                    }
                    let frame = if let Some(at) = prelude.strip_prefix('@') {
                        let (name, params) = split_at_rule(at);
                        Frame::AtRule(AtRule {
                            name,
                            params,
                            nodes: Some(Vec::new()),
                            span,
                        })
                    } else {
                        if prelude.is_empty() {
                            return Err(ParseError::invalid_syntax(
                                range.start,
                                "Rule is missing a selector",
                            ));
                        }
                        Frame::Rule(Rule {
                            selector: prelude,
                            nodes: Vec::new(),
                            span,
                        })
                    };
                    stack.push(frame);
                }
                Token::RBrace => {
                    if !buffer.is_blank() {
                        let (text, span) = buffer.take();
                        let node = statement(&text, span)?;
                        current_nodes(&mut stack, &mut root).push(node);
                    } else {
                        buffer.take();
                    }
                    let Some(frame) = stack.pop() else {
                        return Err(ParseError::unexpected_token(
                            range.start,
                            "a rule or declaration",
                            "'}'",
                        ));
                    };
                    let node = frame.close(range.end);
                    current_nodes(&mut stack, &mut root).push(node);
                }
            }
        }

        if !stack.is_empty() {
            return Err(ParseError::unexpected_eof(self.source_len));
        }

        if !buffer.is_blank() {
            let (text, span) = buffer.take();
            root.push(statement(&text, span)?);
        }

        Ok(Stylesheet {
            path: self.path,
            nodes: root,
        })
    }
}

fn current_nodes<'a>(stack: &'a mut [Frame], root: &'a mut Vec<Node>) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some(frame) => frame.nodes_mut(),
        None => root,
    }
}

/// Block-less statement: declaration or at-rule without body
fn statement(text: &str, span: Span) -> ParseResult<Node> {
    if let Some(at) = text.strip_prefix('@') {
        let (name, params) = split_at_rule(at);
        return Ok(Node::AtRule(AtRule {
            name,
            params,
            nodes: None,
            span,
        }));
    }

    match text.split_once(':') {
        Some((prop, value)) if !prop.trim().is_empty() => Ok(Node::Decl(Declaration {
            prop: prop.trim().to_string(),
            value: value.trim().to_string(),
            span,
        })),
        _ => Err(ParseError::invalid_syntax(
            span.start,
            format!("Expected a declaration, found '{}'", text),
        )),
    }
}

fn split_at_rule(text: &str) -> (String, String) {
    let text = text.trim();
    match text.find(|c: char| c.is_whitespace() || c == '(' || c == '"' || c == '\'') {
        Some(index) => (
            text[..index].to_string(),
            text[index..].trim().to_string(),
        ),
        None => (text.to_string(), String::new()),
    }
}

/// Parse stylesheet source
pub fn parse(source: &str) -> ParseResult<Stylesheet> {
    Parser::new(source)?.parse_stylesheet()
}

/// Parse stylesheet source, attaching the origin path
pub fn parse_with_path(source: &str, path: &str) -> ParseResult<Stylesheet> {
    Parser::new(source)?.with_path(path).parse_stylesheet()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_with_declarations() {
        let sheet = parse(".a { color: red; background: blue }").unwrap();
        assert_eq!(sheet.nodes.len(), 1);
        let rule = sheet.nodes[0].as_rule().unwrap();
        assert_eq!(rule.selector, ".a");
        let decls: Vec<_> = rule.decls().map(|d| (d.prop.as_str(), d.value.as_str())).collect();
        assert_eq!(decls, vec![("color", "red"), ("background", "blue")]);
    }

    #[test]
    fn test_parse_import_block() {
        let sheet = parse(
            r#"
            :import {
                -st-from: "./comp.st.css";
                -st-default: Comp;
            }
            "#,
        )
        .unwrap();
        let rule = sheet.nodes[0].as_rule().unwrap();
        assert_eq!(rule.selector, ":import");
        assert_eq!(rule.find_decl("-st-from").unwrap().value, "\"./comp.st.css\"");
        assert_eq!(rule.find_decl("-st-default").unwrap().value, "Comp");
    }

    #[test]
    fn test_parse_at_rules() {
        let sheet = parse(
            r#"
            @namespace "Button";
            @media (max-width: 100px) {
                .a { color: red; }
            }
            "#,
        )
        .unwrap();
        match &sheet.nodes[0] {
            Node::AtRule(at) => {
                assert_eq!(at.name, "namespace");
                assert_eq!(at.params, "\"Button\"");
                assert!(at.nodes.is_none());
            }
            other => panic!("expected at-rule, got {:?}", other),
        }
        match &sheet.nodes[1] {
            Node::AtRule(at) => {
                assert_eq!(at.name, "media");
                assert_eq!(at.params, "(max-width: 100px)");
                assert_eq!(at.nodes.as_ref().unwrap().len(), 1);
            }
            other => panic!("expected at-rule, got {:?}", other),
        }
    }

    #[test]
    fn test_semicolon_inside_parens_is_value_text() {
        let sheet = parse(".a { background: url(data:image/png;base64,AAA); }").unwrap();
        let rule = sheet.nodes[0].as_rule().unwrap();
        assert_eq!(
            rule.find_decl("background").unwrap().value,
            "url(data:image/png;base64,AAA)"
        );
    }

    #[test]
    fn test_comments_are_dropped() {
        let sheet = parse("/* header */ .a { /* inner */ color: red; }").unwrap();
        let rule = sheet.nodes[0].as_rule().unwrap();
        assert_eq!(rule.nodes.len(), 1);
    }

    #[test]
    fn test_span_points_at_selector() {
        let source = "  .a { color: red; }";
        let sheet = parse(source).unwrap();
        let rule = sheet.nodes[0].as_rule().unwrap();
        assert_eq!(&source[rule.span.start..rule.span.start + 2], ".a");
        assert_eq!(rule.span.end, source.len());
    }

    #[test]
    fn test_unclosed_block_is_error() {
        let err = parse(".a { color: red;").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_stray_closing_brace_is_error() {
        let err = parse(".a { } }").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn test_parse_with_path_attaches_origin() {
        let sheet = parse_with_path(".a {}", "/entry.st.css").unwrap();
        assert_eq!(sheet.path.as_deref(), Some("/entry.st.css"));
    }
}
