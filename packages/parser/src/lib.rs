pub mod ast;
pub mod error;
pub mod parser;
pub mod selector;
pub mod serializer;
pub mod tokenizer;

pub use ast::{AtRule, Declaration, Node, Rule, Span, Stylesheet};
pub use error::{ParseError, ParseResult};
#[cfg(feature = "pretty-errors")]
pub use error::format_error;
pub use parser::{parse, parse_with_path, Parser};
pub use selector::{
    parse_selector, stringify_selector, Cursor, NodeId, SelectorAst, SelectorKind, SelectorNode,
    Visit,
};
pub use serializer::{serialize, Serializer};
pub use tokenizer::{tokenize, Token};
