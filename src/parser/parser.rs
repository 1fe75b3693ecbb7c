//! Parser state: the token table, the item arena, macro and
//! conditional-compilation bookkeeping, and collected errors.
//!
//! Tokens are scanned on demand into an append-only table. Backtracking
//! rewinds the read position without discarding tokens, so regions that
//! are re-parsed after a cancelled speculation hit the cache instead of
//! the lexer. The only operations that drop tokens are the raw
//! re-scanners (define bodies, macro arguments), which must see the
//! underlying bytes again.

use rustc_hash::FxHashMap;

use crate::parser::checkpoint::Save;
use crate::parser::item::{Item, ItemId};
use crate::parser::preprocess::{CondGroup, Expansion, MacroDef};
use crate::parser::token::{BufferId, Span, Token, TokenKind};

/// A collected diagnostic. `stop` marks errors that abort the current
/// declaration; the driver refuses to print output if any were raised.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    pub stop: bool,
}

pub struct Parser {
    pub source: String,

    // Active lexing position. `buf` selects between the source text and
    // a macro expansion buffer; `source_cursor` remembers where source
    // lexing resumes once all expansion frames pop.
    pub(crate) buf: BufferId,
    pub(crate) cursor: usize,
    pub(crate) source_cursor: usize,
    pub(crate) in_directive: bool,
    pub(crate) in_include: bool,

    pub tokens: Vec<Token>,
    pub(crate) tok_i: usize,

    pub arena: Vec<Item>,
    /// Items awaiting adoption by an enclosing wrap. Once parsing
    /// completes this is the list of top-level items.
    pub items: Vec<ItemId>,

    pub macros: FxHashMap<String, MacroDef>,
    pub(crate) expansions: Vec<Expansion>,
    pub(crate) expansion_stack: Vec<u32>,
    /// Count of expansion instances consumed so far; lets a re-parse of
    /// a cancelled region replay recorded expansions by index.
    pub(crate) expansions_i: usize,

    pub groups: Vec<CondGroup>,
    pub(crate) current_group: Option<u32>,
    /// Set when a conditional branch directive interrupted an
    /// expression, telling the expression parser to restart.
    pub(crate) parsed_if: bool,

    pub(crate) saves: Vec<Save>,
    pub errors: Vec<ParseError>,
    pub(crate) stop: bool,
}

impl Parser {
    pub fn new(source: impl Into<String>) -> Self {
        Parser {
            source: source.into(),
            buf: BufferId::Source,
            cursor: 0,
            source_cursor: 0,
            in_directive: false,
            in_include: false,
            tokens: Vec::new(),
            tok_i: 0,
            arena: Vec::new(),
            items: Vec::new(),
            macros: FxHashMap::default(),
            expansions: Vec::new(),
            expansion_stack: Vec::new(),
            expansions_i: 0,
            groups: Vec::new(),
            current_group: None,
            parsed_if: false,
            saves: Vec::new(),
            errors: Vec::new(),
            stop: false,
        }
    }

    /// Parse the whole source into top-level items.
    pub fn parse(&mut self) {
        while !self.expect_pp(TokenKind::Eof, false) {
            if self.stop || !self.parse_decl() {
                break;
            }
        }
    }

    pub fn has_fatal(&self) -> bool {
        self.errors.iter().any(|e| e.stop)
    }

    pub(crate) fn buffer_text(&self, buf: BufferId) -> &str {
        match buf {
            BufferId::Source => &self.source,
            BufferId::Expansion(i) => &self.expansions[i as usize].text,
        }
    }

    pub fn token_text(&self, tok: &Token) -> &str {
        let text = self.buffer_text(tok.buf);
        let from = (tok.span.start as usize).min(text.len());
        let to = (tok.span.end() as usize).min(text.len());
        &text[from..to]
    }

    pub fn token_payload_text(&self, tok: &Token) -> &str {
        match tok.payload {
            Some(p) => {
                let text = self.buffer_text(tok.buf);
                let from = (p.start as usize).min(text.len());
                let to = (p.end() as usize).min(text.len());
                &text[from..to]
            }
            None => "",
        }
    }

    /// Current read position in the token table.
    pub fn position(&self) -> usize {
        self.tok_i
    }

    /// Next token, from the cache when available.
    pub(crate) fn next_token(&mut self) -> Token {
        if self.tok_i < self.tokens.len() {
            let tok = self.tokens[self.tok_i];
            self.tok_i += 1;
            tok
        } else {
            let tok = self.scan_token();
            self.tokens.push(tok);
            self.tok_i = self.tokens.len();
            tok
        }
    }

    /// Consume the next token if it has the given kind. With `err` set,
    /// a mismatch is recorded as a fatal diagnostic and the token is
    /// consumed anyway so parsing can resynchronize.
    pub(crate) fn expect(&mut self, kind: TokenKind, err: bool) -> bool {
        let tok = self.next_token();
        if tok.kind == kind {
            return true;
        }
        if err {
            let span = self.current_span();
            self.error(
                span,
                format!("expected {}, found {}", kind, tok.kind),
                true,
            );
            return true;
        }
        self.tok_i -= 1;
        false
    }

    /// Look `off` tokens ahead without consuming (1 = the next token).
    pub(crate) fn peek_is(&mut self, kind: TokenKind, off: usize) -> bool {
        let pos = self.tok_i;
        let mut tok = self.next_token();
        for _ in 1..off {
            tok = self.next_token();
        }
        self.tok_i = pos;
        tok.kind == kind
    }

    /// Span covering the most recently consumed token.
    pub(crate) fn current_span(&self) -> Span {
        let i = self.tok_i.saturating_sub(1) as u32;
        Span { start: i, end: i }
    }

    pub(crate) fn error(&mut self, span: Span, message: impl Into<String>, stop: bool) {
        self.errors.push(ParseError {
            message: message.into(),
            span,
            stop,
        });
        if stop {
            self.stop = true;
        }
    }

    /// Human-readable rendering with line/column in the token's buffer.
    pub fn render_error(&self, err: &ParseError) -> String {
        let (line, col, expanded) = self.locate(err.span.start as usize);
        format!(
            "{} at line {}, column {}: {}{}",
            if err.stop { "error" } else { "warning" },
            line,
            col,
            err.message,
            if expanded { " (in macro expansion)" } else { "" }
        )
    }

    fn locate(&self, tok_i: usize) -> (usize, usize, bool) {
        let Some(tok) = self.tokens.get(tok_i) else {
            return (1, 1, false);
        };
        let text = self.buffer_text(tok.buf);
        let upto = (tok.span.start as usize).min(text.len());
        let line = 1 + text[..upto].bytes().filter(|&b| b == b'\n').count();
        let col = upto - text[..upto].rfind('\n').map(|i| i + 1).unwrap_or(0) + 1;
        (line, col, tok.buf != BufferId::Source)
    }
}
