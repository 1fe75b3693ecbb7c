//! Token definitions shared by the lexer and the rest of the pipeline.
//!
//! Tokens never own text. Each one records which buffer it was scanned
//! from and the byte range it covers, so the printer can reproduce the
//! original spelling exactly and the parser can slice payloads (string
//! contents, raw macro arguments) on demand.

use std::fmt;

/// Identifies the text buffer a token was scanned from. Most tokens come
/// from the source file; tokens produced while replaying a macro body
/// point at the corresponding expansion buffer instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferId {
    Source,
    Expansion(u32),
}

/// Half-open byte range within a single buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSpan {
    pub start: u32,
    pub len: u32,
}

impl ByteSpan {
    pub fn end(&self) -> u32 {
        self.start + self.len
    }
}

/// Inclusive range of token indices. An "empty" span is encoded as
/// `end < start`, which falls out naturally from wrapping a region in
/// which nothing was consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    LBrace,
    RBrace,
    LBrack,
    RBrack,
    LParen,
    RParen,
    Comma,
    Semi,
    /// Newline that terminates a preprocessor directive.
    EndDir,
    Star,
    Question,
    Colon,
    Amp,
    Ellipsis,
    Dot,
    Arrow,
    Name,
    /// `__`-prefixed identifier; calls to these are passed through
    /// without macro lookup.
    Intrinsic,
    Str,
    Char,
    Num,
    Include,
    Define,
    IfDir,
    IfDef,
    ElifDir,
    ElseDir,
    EndIf,
    /// Any other `#...` directive, kept verbatim.
    Dir,
    Typedef,
    Enum,
    Struct,
    Union,
    Static,
    Inline,
    Const,
    If,
    Else,
    /// `else` directly followed by `if`, folded into one token.
    ElseIf,
    Do,
    While,
    For,
    Defer,
    Return,
    Switch,
    Break,
    Case,
    Default,
    Goto,
    /// Compound assignment operators (`=`, `+=`, `-=`, ...).
    Assign,
    /// `++` / `--`.
    UnaryAssign,
    /// Catch-all for operators and bytes the lexer has no opinion on.
    Other,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBrack => "[",
            TokenKind::RBrack => "]",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::EndDir => "end of directive",
            TokenKind::Star => "*",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::Amp => "&",
            TokenKind::Ellipsis => "...",
            TokenKind::Dot => ".",
            TokenKind::Arrow => "->",
            TokenKind::Name => "identifier",
            TokenKind::Intrinsic => "intrinsic",
            TokenKind::Str => "string",
            TokenKind::Char => "character",
            TokenKind::Num => "number",
            TokenKind::Include => "#include",
            TokenKind::Define => "#define",
            TokenKind::IfDir => "#if",
            TokenKind::IfDef => "#ifdef",
            TokenKind::ElifDir => "#elif",
            TokenKind::ElseDir => "#else",
            TokenKind::EndIf => "#endif",
            TokenKind::Dir => "directive",
            TokenKind::Typedef => "typedef",
            TokenKind::Enum => "enum",
            TokenKind::Struct => "struct",
            TokenKind::Union => "union",
            TokenKind::Static => "static",
            TokenKind::Inline => "inline",
            TokenKind::Const => "const",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::ElseIf => "else if",
            TokenKind::Do => "do",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::Defer => "defer",
            TokenKind::Return => "return",
            TokenKind::Switch => "switch",
            TokenKind::Break => "break",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Goto => "goto",
            TokenKind::Assign => "assignment",
            TokenKind::UnaryAssign => "increment/decrement",
            TokenKind::Other => "operator",
            TokenKind::Eof => "end of file",
        };
        write!(f, "{}", name)
    }
}

/// A single lexed token. `payload` carries the interesting slice for
/// composite tokens: the contents of a string or character literal, or
/// the raw text of a skipped region (macro argument, define body).
#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub buf: BufferId,
    pub span: ByteSpan,
    pub payload: Option<ByteSpan>,
}
