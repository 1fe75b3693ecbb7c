//! On-demand scanner.
//!
//! The scanner is modal: inside a preprocessor directive, newlines
//! terminate the directive with a dedicated token and backslash-newline
//! continuations are honored; inside an `#include`, `<...>` paths lex
//! as string tokens. Whitespace and comments are skipped, never
//! tokenized: the printer recovers them from the gaps between token
//! spans. Unrecognized bytes become catch-all operator tokens so the
//! scanner only fails on genuinely ambiguous input (an unterminated
//! character literal).

use crate::parser::token::{ByteSpan, Token, TokenKind};
use crate::parser::Parser;

impl Parser {
    fn at(&self, i: usize) -> u8 {
        self.buffer_text(self.buf).as_bytes().get(i).copied().unwrap_or(0)
    }

    fn cur(&self) -> u8 {
        self.at(self.cursor)
    }

    /// Consume `s` if the buffer continues with it. Compared as bytes:
    /// the cursor may sit inside a multi-byte character.
    fn match_str(&mut self, s: &str) -> bool {
        let bytes = self.buffer_text(self.buf).as_bytes();
        let hit = bytes
            .get(self.cursor..)
            .map_or(false, |rest| rest.starts_with(s.as_bytes()));
        if hit {
            self.cursor += s.len();
        }
        hit
    }

    fn is_name_byte(&self) -> bool {
        let b = self.cur();
        b == b'_' || b.is_ascii_alphanumeric()
    }

    pub(crate) fn skip_ws(&mut self) {
        loop {
            let b = self.cur();
            let ws = if self.in_directive {
                b == b' ' || b == b'\t'
            } else {
                matches!(b, b' ' | b'\t' | b'\r' | b'\n')
            };
            if !ws {
                break;
            }
            self.cursor += 1;
        }
    }

    fn skip_comment(&mut self) -> bool {
        if self.match_str("//") {
            while self.cur() != 0 && self.cur() != b'\n' {
                self.cursor += 1;
            }
            true
        } else if self.match_str("/*") {
            while self.cur() != 0 && !self.match_str("*/") {
                self.cursor += 1;
            }
            true
        } else {
            false
        }
    }

    /// Contents of a string-ish literal up to the unescaped closer;
    /// advances past the closer.
    fn scan_literal_body(&mut self, close: u8) -> ByteSpan {
        let start = self.cursor;
        while self.cur() != 0 && self.cur() != close {
            if self.cur() == b'\\' {
                self.cursor += 1;
            }
            self.cursor += 1;
        }
        let body = ByteSpan {
            start: start as u32,
            len: (self.cursor - start) as u32,
        };
        if self.cur() != 0 {
            self.cursor += 1;
        }
        body
    }

    /// Tail of a numeric literal. Letters are only folded in when the
    /// literal started with a digit, so hex literals and suffixes stay
    /// one token while `a.b` keeps its dot separate.
    fn scan_number_tail(&mut self, started_digit: bool) -> bool {
        let start = self.cursor;
        loop {
            let b = self.cur();
            let more = b == b'.'
                || b.is_ascii_digit()
                || (started_digit && (b == b'_' || b.is_ascii_alphanumeric()));
            if !more {
                break;
            }
            self.cursor += 1;
        }
        self.cursor > start
    }

    fn scan_word(&mut self) -> TokenKind {
        use TokenKind::*;
        let mut kind = if self.match_str("if") {
            If
        } else if self.match_str("else") {
            if self.is_name_byte() {
                return Name;
            }
            // `else if` joins into one token, with bounded lookahead to
            // keep `else iffy` apart.
            self.skip_ws();
            let back = self.cursor;
            let mut k = Else;
            if self.match_str("if") {
                k = ElseIf;
                if self.is_name_byte() {
                    k = Else;
                    self.cursor = back;
                }
            }
            return k;
        } else if self.match_str("defer") {
            Defer
        } else if self.match_str("return") {
            Return
        } else if self.match_str("do") {
            Do
        } else if self.match_str("while") {
            While
        } else if self.match_str("for") {
            For
        } else if self.match_str("goto") {
            Goto
        } else if self.match_str("switch") {
            Switch
        } else if self.match_str("break") {
            Break
        } else if self.match_str("case") {
            Case
        } else if self.match_str("default") {
            Default
        } else if self.match_str("typedef") {
            Typedef
        } else if self.match_str("enum") {
            Enum
        } else if self.match_str("struct") {
            Struct
        } else if self.match_str("union") {
            Union
        } else if self.match_str("static") {
            Static
        } else if self.match_str("inline") {
            Inline
        } else if self.match_str("const") {
            Const
        } else if self.match_str("__") {
            Intrinsic
        } else if self.is_name_byte() {
            Name
        } else {
            // Anything else is an opaque single byte.
            return Other;
        };
        // A keyword glued to more identifier characters is a plain
        // name; `__` glued to more is still an intrinsic.
        if kind != Intrinsic && self.is_name_byte() {
            kind = Name;
        }
        if kind == Name || kind == Intrinsic {
            while self.is_name_byte() {
                self.cursor += 1;
            }
        }
        kind
    }

    /// Scan one token at the current buffer position.
    pub(crate) fn scan_token(&mut self) -> Token {
        use TokenKind::*;
        loop {
            self.skip_ws();
            if self.in_directive {
                if self.cur() == b'\\' {
                    self.cursor += 2;
                    continue;
                }
                if self.cur() == b'\r' || self.cur() == b'\n' {
                    self.in_directive = false;
                    self.in_include = false;
                    let start = self.cursor;
                    self.cursor += 1;
                    return self.make_token(EndDir, start, None);
                }
            }
            if !self.skip_comment() || self.cur() == 0 {
                break;
            }
        }

        let start = self.cursor;
        if self.in_include && self.cur() == b'<' {
            self.cursor += 1;
            let payload = self.scan_literal_body(b'>');
            return self.make_token(Str, start, Some(payload));
        }

        let mut payload = None;
        let kind = match self.cur() {
            0 => Eof,
            b'{' => LBrace,
            b'}' => RBrace,
            b'[' => LBrack,
            b']' => RBrack,
            b'(' => LParen,
            b')' => RParen,
            b',' => Comma,
            b';' => Semi,
            b'?' => Question,
            b':' => Colon,
            b'\'' => {
                self.cursor += 1;
                let pstart = self.cursor;
                if self.cur() == b'\\' {
                    self.cursor += 1;
                }
                self.cursor += 1;
                payload = Some(ByteSpan {
                    start: pstart as u32,
                    len: (self.cursor - pstart) as u32,
                });
                if self.cur() != b'\'' {
                    let span = self.current_span();
                    self.error(span, "unterminated character literal", true);
                } else {
                    self.cursor += 1;
                }
                Char
            }
            b'"' => {
                self.cursor += 1;
                payload = Some(self.scan_literal_body(b'"'));
                Str
            }
            b'#' => {
                self.cursor += 1;
                if self.in_directive {
                    // `#`/`##` inside a directive body pass through.
                    Other
                } else {
                    self.in_directive = true;
                    if self.match_str("include") {
                        self.in_include = true;
                        Include
                    } else if self.match_str("ifdef") {
                        IfDef
                    } else if self.match_str("if") {
                        IfDir
                    } else if self.match_str("elif") {
                        ElifDir
                    } else if self.match_str("else") {
                        self.in_directive = false;
                        ElseDir
                    } else if self.match_str("endif") {
                        self.in_directive = false;
                        EndIf
                    } else if self.match_str("define") {
                        Define
                    } else {
                        Dir
                    }
                }
            }
            b'.' | b'0'..=b'9' => {
                if self.match_str("...") {
                    Ellipsis
                } else {
                    let first = self.cur();
                    self.cursor += 1;
                    let more = self.scan_number_tail(first.is_ascii_digit());
                    if first == b'.' && !more {
                        Dot
                    } else {
                        Num
                    }
                }
            }
            b'-' | b'+' | b'*' | b'/' | b'%' | b'&' | b'|' | b'^' | b'~' => {
                let first = self.cur();
                self.cursor += 1;
                if self.cur() == b'=' {
                    self.cursor += 1;
                    Assign
                } else if first == b'-' && self.cur() == b'>' {
                    self.cursor += 1;
                    Arrow
                } else if (first == b'+' || first == b'-') && self.cur() == first {
                    self.cursor += 1;
                    UnaryAssign
                } else if (first == b'&' || first == b'|') && self.cur() == first {
                    self.cursor += 1;
                    Other
                } else if first == b'*' {
                    Star
                } else if first == b'&' {
                    Amp
                } else {
                    Other
                }
            }
            b'!' | b'<' | b'>' | b'=' => {
                let first = self.cur();
                self.cursor += 1;
                if self.cur() == b'=' {
                    self.cursor += 1;
                    Other
                } else if first == b'=' {
                    Assign
                } else {
                    Other
                }
            }
            _ => self.scan_word(),
        };

        // Tokens that fall out of the match without advancing consume
        // one whole character, so spans stay on UTF-8 boundaries.
        if self.cursor == start && kind != Eof {
            self.cursor += match self.cur() {
                0xc0..=0xdf => 2,
                0xe0..=0xef => 3,
                0xf0..=0xf7 => 4,
                _ => 1,
            };
        }
        self.make_token(kind, start, payload)
    }

    fn make_token(&self, kind: TokenKind, start: usize, payload: Option<ByteSpan>) -> Token {
        Token {
            kind,
            buf: self.buf,
            span: ByteSpan {
                start: start as u32,
                len: (self.cursor - start) as u32,
            },
            payload,
        }
    }

    /// Reposition the raw cursor at the token the parser is about to
    /// read, dropping that token and everything after it so the bytes
    /// can be re-scanned with different rules.
    fn reparse_raw(&mut self) {
        if let Some(&tok) = self.tokens.get(self.tok_i) {
            let stale = match tok.buf {
                crate::parser::token::BufferId::Expansion(i) => (i as usize) >= self.expansions_i,
                crate::parser::token::BufferId::Source => false,
            };
            if !stale {
                self.buf = tok.buf;
                self.cursor = tok.span.start as usize;
            }
            self.tokens.truncate(self.tok_i);
            self.expansions.truncate(self.expansions_i);
        }
        self.tok_i += 1;
    }

    /// Consume the rest of a directive line as one raw string token,
    /// honoring backslash continuations.
    pub(crate) fn skip_define_body(&mut self) -> Token {
        self.reparse_raw();
        self.skip_ws();
        let start = self.cursor;
        while self.cur() != 0 && self.cur() != b'\n' && self.cur() != b'\r' {
            if self.cur() == b'\\' {
                self.cursor += 1;
            }
            self.cursor += 1;
        }
        self.in_directive = false;
        let span = ByteSpan {
            start: start as u32,
            len: (self.cursor - start) as u32,
        };
        let tok = Token {
            kind: TokenKind::Str,
            buf: self.buf,
            span,
            payload: Some(span),
        };
        self.tokens.push(tok);
        tok
    }

    /// Consume one raw macro argument as a string token: everything up
    /// to a comma or closing paren at nesting depth zero.
    pub(crate) fn skip_macro_arg(&mut self) -> Token {
        self.reparse_raw();
        self.skip_ws();
        let start = self.cursor;
        let mut depth = 0usize;
        loop {
            let b = self.cur();
            if b == 0 || ((b == b')' || b == b',') && depth == 0) {
                break;
            }
            if b == b'(' {
                depth += 1;
            } else if b == b')' {
                depth -= 1;
            }
            self.cursor += 1;
        }
        let span = ByteSpan {
            start: start as u32,
            len: (self.cursor - start) as u32,
        };
        let tok = Token {
            kind: TokenKind::Str,
            buf: self.buf,
            span,
            payload: Some(span),
        };
        self.tokens.push(tok);
        tok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut p = Parser::new(src);
        let mut out = Vec::new();
        loop {
            let tok = p.next_token();
            if tok.kind == TokenKind::Eof {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn basic_statement() {
        use TokenKind::*;
        assert_eq!(
            kinds("int x = 5;"),
            vec![Name, Name, Assign, Num, Semi]
        );
    }

    #[test]
    fn keywords_and_glued_names() {
        use TokenKind::*;
        assert_eq!(kinds("if iffy defer deferred"), vec![If, Name, Defer, Name]);
    }

    #[test]
    fn else_if_joins_into_one_token() {
        use TokenKind::*;
        assert_eq!(kinds("else if"), vec![ElseIf]);
        assert_eq!(kinds("else {"), vec![Else, LBrace]);
    }

    #[test]
    fn operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("a += b -> c ++ && == * &"),
            vec![Name, Assign, Name, Arrow, Name, UnaryAssign, Other, Other, Star, Amp]
        );
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        use TokenKind::*;
        assert_eq!(kinds("a /* x */ b // y\nc"), vec![Name, Name, Name]);
    }

    #[test]
    fn directive_mode_emits_enddir() {
        use TokenKind::*;
        assert_eq!(
            kinds("#ifdef FOO\nint x;"),
            vec![IfDef, Name, EndDir, Name, Name, Semi]
        );
    }

    #[test]
    fn include_path_lexes_as_string() {
        let mut p = Parser::new("#include <stdio.h>\n");
        assert_eq!(p.next_token().kind, TokenKind::Include);
        let path = p.next_token();
        assert_eq!(path.kind, TokenKind::Str);
        assert_eq!(p.token_payload_text(&path), "stdio.h");
        assert_eq!(p.next_token().kind, TokenKind::EndDir);
    }

    #[test]
    fn string_and_char_payloads() {
        let mut p = Parser::new(r#""a\"b" '\n'"#);
        let s = p.next_token();
        assert_eq!(s.kind, TokenKind::Str);
        assert_eq!(p.token_payload_text(&s), r#"a\"b"#);
        let c = p.next_token();
        assert_eq!(c.kind, TokenKind::Char);
        assert_eq!(p.token_payload_text(&c), r"\n");
    }

    #[test]
    fn ellipsis_dot_and_numbers() {
        use TokenKind::*;
        assert_eq!(kinds("... .5 a.b 10"), vec![Ellipsis, Num, Name, Dot, Name, Num]);
    }

    #[test]
    fn unknown_bytes_are_catchall_operators() {
        use TokenKind::*;
        assert_eq!(kinds("a @ b"), vec![Name, Other, Name]);
    }

    #[test]
    fn multibyte_characters_lex_as_whole_catchall_tokens() {
        use TokenKind::*;
        assert_eq!(kinds("int x = é; // voilà"), vec![Name, Name, Assign, Other, Semi]);
        assert_eq!(kinds("a 漢 b"), vec![Name, Other, Name]);
    }

    #[test]
    fn double_underscore_names_lex_as_intrinsics() {
        use TokenKind::*;
        assert_eq!(
            kinds("__builtin __ _one x"),
            vec![Intrinsic, Intrinsic, Name, Name]
        );
    }

    #[test]
    fn backslash_continuation_inside_directive() {
        use TokenKind::*;
        assert_eq!(
            kinds("#if A \\\n B\nx"),
            vec![IfDir, Name, Name, EndDir, Name]
        );
    }

    #[test]
    fn unterminated_char_literal_is_fatal() {
        let mut p = Parser::new("'ab");
        p.next_token();
        assert!(p.has_fatal());
    }
}
