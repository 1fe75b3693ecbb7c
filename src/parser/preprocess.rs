//! Preprocessor handling: macro definitions and expansion, includes,
//! unknown directives, and conditional-compilation groups.
//!
//! Directives are not evaluated. `#include` lines are recorded and
//! re-emitted; `#define` bodies are stored as raw text and replayed
//! through expansion buffers at call sites; conditional branches are
//! *all* parsed, with every item tagged by its group and branch so the
//! printer can interleave them back under the original directives.

use tracing::trace;

use crate::parser::checkpoint::Save;
use crate::parser::item::{ItemId, ItemKind};
use crate::parser::token::{BufferId, TokenKind};
use crate::parser::Parser;

/// A `#define`: parameter names and the raw body text. A parenthesized
/// definition is function-like even with zero parameters, and its call
/// sites carry argument parens.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub params: Vec<String>,
    pub body: String,
    pub function_like: bool,
}

/// One macro expansion instance: the substituted body text and the
/// lexer's resume position within it.
#[derive(Debug, Clone)]
pub(crate) struct Expansion {
    pub text: String,
    pub cursor: usize,
}

/// One `#if`/`#ifdef` ... `#endif` region. Groups nest: a group opened
/// inside a branch of another group records its parent and which parent
/// branch it lives in.
#[derive(Debug, Clone)]
pub struct CondGroup {
    pub parent: Option<u32>,
    pub parent_branch: u32,
    /// Current branch index while parsing, and replayed by the printer.
    pub branch_pos: u32,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone)]
pub struct Branch {
    /// The directive item that opens this branch.
    pub item: ItemId,
    pub(crate) save: Save,
}

/// Whole-identifier textual substitution of macro parameters, skipping
/// string and character literals.
fn substitute_params(body: &str, params: &[String], args: &[String]) -> String {
    let bytes = body.as_bytes();
    let mut out = String::with_capacity(body.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' || b == b'\'' {
            let close = b;
            let start = i;
            i += 1;
            while i < bytes.len() && bytes[i] != close {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(bytes.len());
            out.push_str(&body[start..i]);
        } else if b == b'_' || b.is_ascii_alphabetic() {
            let start = i;
            while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                i += 1;
            }
            let word = &body[start..i];
            match params.iter().position(|p| p == word) {
                Some(n) => out.push_str(args.get(n).map(String::as_str).unwrap_or("")),
                None => out.push_str(word),
            }
        } else {
            // One whole character, so multi-byte text survives intact.
            let n = body[i..].chars().next().map_or(1, char::len_utf8);
            out.push_str(&body[i..i + n]);
            i += n;
        }
    }
    out
}

impl Parser {
    /// Expect with preprocessor handling at the current position.
    pub(crate) fn expect_pp(&mut self, kind: TokenKind, err: bool) -> bool {
        self.handle_pp();
        self.expect(kind, err)
    }

    pub(crate) fn expect_start_pp(&mut self, kind: TokenKind) -> bool {
        self.handle_pp();
        self.expect_start(kind)
    }

    /// Open a checkpoint after consuming any directives and macro calls
    /// at the current position. Keeps macro-call items out of the span
    /// the checkpoint will wrap, which matters for items the printer
    /// reproduces verbatim.
    pub(crate) fn start_pp(&mut self) {
        self.handle_pp();
        self.start();
    }

    pub(crate) fn peek_pp(&mut self, kind: TokenKind, off: usize) -> bool {
        self.handle_pp();
        self.peek_is(kind, off)
    }

    /// Consume any run of directives and macro calls at the current
    /// position, producing their items in place.
    pub(crate) fn handle_pp(&mut self) {
        loop {
            self.handle_macros();
            if self.expect_start(TokenKind::Include) {
                self.parse_include();
            } else if self.expect_start(TokenKind::Define) {
                self.parse_define();
            } else if self.parse_conditional() {
                continue;
            } else if self.expect_start(TokenKind::Dir) {
                self.skip_define_body();
                self.push_item(ItemKind::Dir);
            } else if self.expect_start(TokenKind::Intrinsic) {
                self.parse_intrinsic_call();
            } else {
                return;
            }
        }
    }

    /// If the next token names a known macro, parse the call and enter
    /// an expansion buffer. Also unwinds expansion frames at their end.
    fn handle_macros(&mut self) {
        loop {
            let tok = self.next_token();
            self.tok_i -= 1;
            if tok.kind == TokenKind::Eof {
                if self.expansion_stack.is_empty() {
                    return;
                }
                self.start();
                self.expect(TokenKind::Eof, false);
                self.push_item(ItemKind::MacroEof);
                self.pop_frame();
                // There may be another macro call right after.
                continue;
            }
            if tok.kind != TokenKind::Name {
                return;
            }
            let name = self.token_text(&tok).to_string();
            let Some(def) = self.macros.get(&name) else { return };
            let (params, body, function_like) =
                (def.params.clone(), def.body.clone(), def.function_like);
            trace!(name = %name, "expanding macro");

            self.start();
            self.expect(TokenKind::Name, true);
            self.wrap_item(ItemKind::Name);
            let mut text = body;
            if function_like {
                self.start();
                self.expect(TokenKind::LParen, true);
                let mut args = Vec::new();
                for i in 0..params.len() {
                    self.start();
                    let arg_tok = self.skip_macro_arg();
                    args.push(self.token_payload_text(&arg_tok).to_string());
                    self.push_item(ItemKind::MacroArg);
                    if i + 1 == params.len() {
                        self.expect(TokenKind::RParen, true);
                    } else {
                        self.expect(TokenKind::Comma, true);
                    }
                }
                if params.is_empty() {
                    self.expect(TokenKind::RParen, true);
                }
                self.push_item(ItemKind::Args);
                text = substitute_params(&text, &params, &args);
            }
            self.push_expansion(text);
            self.push_item(ItemKind::MacroCall);
            // The expansion may itself start with a macro call.
        }
    }

    fn push_expansion(&mut self, text: String) {
        // Remember where lexing resumes in the enclosing buffer.
        match self.expansion_stack.last() {
            Some(&top) => self.expansions[top as usize].cursor = self.cursor,
            None => self.source_cursor = self.cursor,
        }
        let idx = if self.expansions_i < self.expansions.len() {
            // Re-parsing a region rolled back past this call: replay
            // the recorded instance instead of minting a new one.
            let idx = self.expansions_i as u32;
            self.cursor = self.expansions[self.expansions_i].cursor;
            idx
        } else {
            let idx = self.expansions.len() as u32;
            self.expansions.push(Expansion { text, cursor: 0 });
            self.cursor = 0;
            idx
        };
        self.expansion_stack.push(idx);
        self.expansions_i += 1;
        self.buf = BufferId::Expansion(idx);
    }

    fn pop_frame(&mut self) {
        self.expansion_stack.pop();
        match self.expansion_stack.last() {
            Some(&up) => {
                self.buf = BufferId::Expansion(up);
                self.cursor = self.expansions[up as usize].cursor;
            }
            None => {
                self.buf = BufferId::Source;
                self.cursor = self.source_cursor;
            }
        }
    }

    fn parse_include(&mut self) {
        self.handle_macros();
        self.start();
        self.expect(TokenKind::Str, true);
        self.push_item(ItemKind::LitStr);
        self.expect(TokenKind::EndDir, true);
        self.push_item(ItemKind::Include);
    }

    fn parse_define(&mut self) {
        self.start();
        self.expect(TokenKind::Name, true);
        let name_item = self.push_item(ItemKind::Name);
        let name = self.item_text(name_item);

        let mut params = Vec::new();
        self.start();
        let function_like = self.expect(TokenKind::LParen, false);
        if function_like && !self.expect(TokenKind::RParen, false) {
            loop {
                self.start();
                self.expect(TokenKind::Name, true);
                let param = self.push_item(ItemKind::Name);
                params.push(self.item_text(param));
                if !self.expect(TokenKind::Comma, false) {
                    self.expect(TokenKind::RParen, true);
                    break;
                }
            }
        }
        self.push_item(ItemKind::Args);

        self.start();
        let body_tok = self.skip_define_body();
        let body = self.token_payload_text(&body_tok).to_string();
        self.push_item(ItemKind::Body);
        self.push_item(ItemKind::Define);

        trace!(name = %name, params = params.len(), "defined macro");
        self.macros.insert(
            name,
            MacroDef {
                params,
                body,
                function_like,
            },
        );
    }

    /// `__name(raw, raw, ...)` calls pass through without lookup but
    /// still go through raw argument capture, so their arguments keep
    /// balanced parentheses.
    fn parse_intrinsic_call(&mut self) {
        self.wrap_item(ItemKind::Name);
        self.start();
        if self.expect(TokenKind::LParen, false) && !self.expect(TokenKind::RParen, false) {
            loop {
                self.start();
                self.skip_macro_arg();
                self.push_item(ItemKind::MacroArg);
                if !self.expect(TokenKind::Comma, false) {
                    self.expect(TokenKind::RParen, true);
                    break;
                }
            }
        }
        self.push_item(ItemKind::Args);
        self.push_item(ItemKind::MacroCall);
    }

    /// Handle a conditional directive at the current position. Returns
    /// true when one was consumed.
    pub(crate) fn parse_conditional(&mut self) -> bool {
        self.parsed_if = false;
        if self.expect_start(TokenKind::IfDef) {
            self.expect(TokenKind::Name, true);
            self.expect(TokenKind::EndDir, true);
            self.open_branch(ItemKind::IfDef, false);
        } else if self.expect_start(TokenKind::IfDir) {
            self.skip_define_body();
            self.open_branch(ItemKind::IfDir, false);
        } else if self.expect_start(TokenKind::ElifDir) {
            self.skip_define_body();
            self.open_branch(ItemKind::ElifDir, true);
            self.parsed_if = true;
        } else if self.expect_start(TokenKind::ElseDir) {
            self.open_branch(ItemKind::ElseDir, true);
            self.parsed_if = true;
        } else if self.expect(TokenKind::EndIf, false) {
            match self.current_group {
                Some(g) => self.current_group = self.groups[g as usize].parent,
                None => {
                    let span = self.current_span();
                    self.error(span, "#endif without matching #if", true);
                    return false;
                }
            }
            self.parsed_if = true;
        } else {
            return false;
        }
        true
    }

    /// Record a branch directive: open a new group for `#if`/`#ifdef`,
    /// or advance the current group for `#elif`/`#else`.
    fn open_branch(&mut self, kind: ItemKind, advance: bool) {
        let item = self.push_item_oob(kind);
        let group = if advance {
            match self.current_group {
                Some(g) => {
                    self.groups[g as usize].branch_pos += 1;
                    g
                }
                None => {
                    let span = self.current_span();
                    self.error(span, "branch directive without matching #if", true);
                    return;
                }
            }
        } else {
            let parent = self.current_group;
            let parent_branch = parent.map_or(0, |p| self.groups[p as usize].branch_pos);
            let g = self.groups.len() as u32;
            self.groups.push(CondGroup {
                parent,
                parent_branch,
                branch_pos: 0,
                branches: Vec::new(),
            });
            self.current_group = Some(g);
            g
        };
        let save = self.save_state();
        self.groups[group as usize].branches.push(Branch { item, save });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn substitution_respects_word_boundaries() {
        let params = vec!["x".to_string()];
        let args = vec!["42".to_string()];
        assert_eq!(substitute_params("x + xx + axb", &params, &args), "42 + xx + axb");
    }

    #[test]
    fn substitution_skips_string_literals() {
        let params = vec!["x".to_string()];
        let args = vec!["1".to_string()];
        assert_eq!(substitute_params("\"x\" x", &params, &args), "\"x\" 1");
    }

    #[test]
    fn substitution_preserves_multibyte_text() {
        let params = vec!["x".to_string()];
        let args = vec!["1".to_string()];
        assert_eq!(substitute_params("é ? x : \"λ\"", &params, &args), "é ? 1 : \"λ\"");
    }

    #[test]
    fn define_is_registered() {
        let mut p = Parser::new("#define N 10\n");
        p.handle_pp();
        let def = p.macros.get("N").unwrap();
        assert!(def.params.is_empty());
        assert_eq!(def.body, "10");
    }

    #[test]
    fn parameterized_define() {
        let mut p = Parser::new("#define ADD(a, b) a + b\n");
        p.handle_pp();
        let def = p.macros.get("ADD").unwrap();
        assert_eq!(def.params, vec!["a", "b"]);
        assert_eq!(def.body, "a + b");
    }

    #[test]
    fn zero_parameter_function_macro_consumes_call_parens() {
        let mut p = Parser::new("#define CLEAN() free(p)\nCLEAN()");
        p.handle_pp();
        let def = p.macros.get("CLEAN").unwrap();
        assert!(def.params.is_empty());
        assert!(def.function_like);
        // the call-site parens were consumed; the next token comes from
        // the expansion
        let tok = p.next_token();
        assert_eq!(tok.kind, TokenKind::Name);
        assert_eq!(p.token_text(&tok), "free");
        assert!(matches!(tok.buf, BufferId::Expansion(_)));
    }

    #[test]
    fn macro_argument_capture_keeps_parens_balanced() {
        let mut p = Parser::new("#define M(a, b) a\nM((1, 2), 3)");
        p.handle_pp();
        let args: Vec<String> = p
            .arena
            .iter()
            .enumerate()
            .filter(|(_, it)| it.kind == ItemKind::MacroArg)
            .map(|(i, _)| p.item_text(i))
            .collect();
        assert_eq!(args, vec!["(1, 2)", "3"]);
    }

    #[test]
    fn expansion_feeds_tokens_from_macro_body() {
        let mut p = Parser::new("#define N 10\nN");
        p.handle_pp();
        let tok = p.next_token();
        assert_eq!(tok.kind, TokenKind::Num);
        assert_eq!(p.token_text(&tok), "10");
        assert!(matches!(tok.buf, BufferId::Expansion(_)));
    }

    #[test]
    fn intrinsic_calls_pass_through() {
        let mut p = Parser::new("__builtin(x + (y), z)");
        p.handle_pp();
        assert!(p.macros.is_empty());
        let call = p.items.last().copied().unwrap();
        assert_eq!(p.arena[call].kind, ItemKind::MacroCall);
    }

    #[test]
    fn conditional_groups_track_all_branches() {
        let mut p = Parser::new("#ifdef A\n#elif B\n#else\n#endif\n");
        p.handle_pp();
        assert_eq!(p.groups.len(), 1);
        assert_eq!(p.groups[0].branches.len(), 3);
        assert_eq!(p.current_group, None);
    }

    #[test]
    fn unmatched_endif_is_fatal() {
        let mut p = Parser::new("#endif\n");
        p.handle_pp();
        assert!(p.has_fatal());
    }
}
