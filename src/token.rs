use std::fmt;

use log::debug;
use phf::phf_map;

/// Byte and line location within the input stream.
///
/// `offset` is the absolute 0-based byte offset from the beginning of the
/// logical source; `line` and `column` are 0-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub offset: u64,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    OpenBracket,
    CloseBracket,
    Separator,
    Keyword,
    String,
    Comment,
    Whitespace,
    Integer,
    Floating,
    SpecialCharacter,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Eof => "eof",

            TokenKind::OpenBracket => "open_bracket",

            TokenKind::CloseBracket => "close_bracket",

            TokenKind::Separator => "separator",

            TokenKind::Keyword => "keyword",

            TokenKind::String => "string",

            TokenKind::Comment => "comment",

            TokenKind::Whitespace => "whitespace",

            TokenKind::Integer => "integer",

            TokenKind::Floating => "floating",

            TokenKind::SpecialCharacter => "special_character",
        }
    }
}

/// A single lexeme with its start position.
///
/// `word` holds the raw text, except for strings where it holds the decoded
/// content without the surrounding quotes.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
    pub word: String,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Position, word: String) -> Self {
        debug!("new token: kind={:?}, word={:?}, pos=<{}>", kind, word, pos);

        Self { kind, pos, word }
    }
}

impl Default for Token {
    fn default() -> Self {
        Self {
            kind: TokenKind::Eof,
            pos: Position::default(),
            word: String::new(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token({}) <{}>(\"{}\")",
            self.kind.name(),
            self.pos,
            self.word
        )
    }
}

/// Structural role of a recognised keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordRole {
    /// `if`, `elif`, `while`, `for`, `catch` — expects a parenthesised
    /// condition.
    Condition,

    /// `else`, `try`, `finally` — expects a body.
    Control,

    /// `return`, `continue`, `break`, `goto`.
    Jump,
}

static KEYWORDS: phf::Map<&'static str, KeywordRole> = phf_map! {
    "if" => KeywordRole::Condition,
    "elif" => KeywordRole::Condition,
    "while" => KeywordRole::Condition,
    "for" => KeywordRole::Condition,
    "catch" => KeywordRole::Condition,
    "else" => KeywordRole::Control,
    "try" => KeywordRole::Control,
    "finally" => KeywordRole::Control,
    "return" => KeywordRole::Jump,
    "continue" => KeywordRole::Jump,
    "break" => KeywordRole::Jump,
    "goto" => KeywordRole::Jump,
};

/// Look up the structural role of a keyword lexeme, if it has one.
pub fn keyword_role(word: &str) -> Option<KeywordRole> {
    KEYWORDS.get(word).copied()
}

/// True for the loop-forming condition keywords.
pub fn is_loop_keyword(word: &str) -> bool {
    matches!(word, "for" | "while")
}

/// True for jump keywords that carry a body target.
pub fn jump_expects_body(word: &str) -> bool {
    !matches!(word, "continue" | "break")
}

/// True for the secondary keywords that extend a preceding control chain.
pub fn is_chain_keyword(word: &str) -> bool {
    matches!(word, "else" | "elif" | "catch" | "finally")
}
