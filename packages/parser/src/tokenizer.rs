use logos::Logos;
use std::ops::Range;

/// Structural tokens of a stylesheet.
///
/// Everything that is not structure is lexed as `Text`, whitespace included,
/// so the parser can rebuild preludes and values verbatim.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
pub enum Token<'src> {
    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(";")]
    Semicolon,

    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", |lex| lex.slice())]
    Comment(&'src str),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice())]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| lex.slice())]
    String(&'src str),

    #[token("/")]
    Slash,

    #[regex(r#"[^{};"'/]+"#, |lex| lex.slice())]
    Text(&'src str),
}

/// Tokenize a stylesheet, keeping byte ranges.
///
/// Lexer failures (an unterminated string, for instance) are returned as
/// `Err(range)` so the parser can report a position.
pub fn tokenize(source: &str) -> Result<Vec<(Token<'_>, Range<usize>)>, Range<usize>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => return Err(lexer.span()),
        }
    }

    Ok(tokens)
}
