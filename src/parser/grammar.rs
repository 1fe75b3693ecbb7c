//! Recursive-descent grammar over the checkpointed token stream.
//!
//! The grammar recognizes just enough C structure to find functions,
//! blocks, statements and the handful of expression shapes the printer
//! rewrites. Operator chains are kept flat and left-associated with no
//! precedence; the compiler consuming the output re-parses them anyway.
//! Alternatives are tried speculatively: a failed attempt cancels its
//! checkpoint and the next alternative re-reads the same tokens from
//! the cache.
//!
//! Convention: `parse_expr_left` leaves its checkpoint open when it
//! returns true (the caller wraps it into the expression item) and
//! closed when it returns false.

use crate::parser::item::ItemKind;
use crate::parser::token::TokenKind;
use crate::parser::Parser;

impl Parser {
    /// `[expr [, expr]*] )` — call arguments, closing paren included.
    fn parse_args(&mut self) {
        if self.expect_pp(TokenKind::RParen, false) {
            return;
        }
        loop {
            self.parse_expr(false, false);
            if !self.expect_pp(TokenKind::Comma, false) {
                self.expect_pp(TokenKind::RParen, true);
                break;
            }
        }
    }

    /// Postfix chain: indexing, `->`, `.`.
    fn parse_addendums(&mut self) {
        loop {
            if self.expect_pp(TokenKind::LBrack, false) {
                self.start_pp();
                self.parse_expr(true, false);
                self.push_item(ItemKind::Array);
                self.expect_pp(TokenKind::RBrack, true);
            } else if self.expect_pp(TokenKind::Arrow, false) {
                self.start_pp();
                self.expect_pp(TokenKind::Name, true);
                self.push_item(ItemKind::Access);
            } else if self.expect_pp(TokenKind::Dot, false) {
                self.start_pp();
                self.expect_pp(TokenKind::Name, true);
                self.push_item(ItemKind::Dot);
            } else {
                break;
            }
        }
    }

    /// Declarator: pointer/const modifiers, function-pointer shape or
    /// a name (when `named`), then array suffixes.
    fn parse_aftertype(&mut self, named: bool) -> bool {
        self.start_pp();
        if self.expect_start_pp(TokenKind::Const) || self.expect_start_pp(TokenKind::Star) {
            while self.expect_pp(TokenKind::Const, false) || self.expect_pp(TokenKind::Star, false)
            {
            }
            self.push_item(ItemKind::TypeMod);
        }
        if self.expect_start_pp(TokenKind::LParen) {
            if !self.expect_pp(TokenKind::Star, false) {
                self.finish();
                self.cancel();
                return false;
            }
            if named && !self.parse_aftertype(true) {
                self.finish();
                self.cancel();
                return false;
            }
            self.expect_pp(TokenKind::RParen, true);
            self.expect_pp(TokenKind::LParen, true);
            if !self.expect_pp(TokenKind::RParen, false) {
                loop {
                    self.parse_arg();
                    if !self.expect_pp(TokenKind::Comma, false) {
                        self.expect_pp(TokenKind::RParen, true);
                        break;
                    }
                }
            }
            self.push_item(ItemKind::FnPtr);
        } else if named {
            if !self.expect_start_pp(TokenKind::Name) {
                self.cancel();
                return false;
            }
            self.push_item(ItemKind::Name);
        }
        if named {
            self.parse_addendums();
        } else if self.expect_start_pp(TokenKind::LBrack) {
            self.expect_pp(TokenKind::RBrack, true);
            self.push_item(ItemKind::Array);
        }
        self.push_item(ItemKind::Declarator);
        true
    }

    /// One parameter: `...`, a named declaration, or an abstract type.
    fn parse_arg(&mut self) {
        self.start_pp();
        if self.expect_pp(TokenKind::Ellipsis, false) {
            // varargs marker; no children
        } else if !self.parse_ty(true) {
            self.parse_ty(false);
        }
        self.push_item(ItemKind::Arg);
    }

    /// Brace initializer: positional, `.field =`, `[index] =`.
    fn parse_initializer(&mut self) -> bool {
        self.start();
        if !self.expect_pp(TokenKind::LBrace, false) {
            self.finish();
            return false;
        }
        if !self.expect_pp(TokenKind::RBrace, false) {
            loop {
                self.start_pp();
                if self.expect_pp(TokenKind::Dot, false) {
                    self.start_pp();
                    self.expect_pp(TokenKind::Name, true);
                    self.push_item(ItemKind::Name);
                    self.expect_pp(TokenKind::Assign, true);
                    self.parse_expr(false, false);
                    self.push_item(ItemKind::InitField);
                } else if self.expect_pp(TokenKind::LBrack, false) {
                    self.parse_expr(false, false);
                    self.expect_pp(TokenKind::RBrack, true);
                    self.expect_pp(TokenKind::Assign, true);
                    self.parse_expr(false, false);
                    self.push_item(ItemKind::InitIndex);
                } else {
                    self.parse_expr(false, false);
                    self.finish();
                }
                if !self.expect_pp(TokenKind::Comma, false) {
                    self.expect_pp(TokenKind::RBrace, true);
                    break;
                }
                // Trailing comma.
                if self.expect_pp(TokenKind::RBrace, false) {
                    break;
                }
            }
        }
        self.push_item(ItemKind::Initializer);
        true
    }

    /// Binary/unary operator token, wrapped as an item.
    fn parse_op(&mut self) -> bool {
        if self.expect_start_pp(TokenKind::Other) || self.expect_start_pp(TokenKind::Star) {
            self.push_item(ItemKind::Op);
            return true;
        }
        false
    }

    /// One operand with prefixes and postfixes. On success the covering
    /// checkpoint is left open for the caller's expression wrap.
    fn parse_expr_left(&mut self, optional: bool) -> bool {
        self.start_pp();
        let reference = self.expect_pp(TokenKind::Amp, false);
        if reference {
            self.wrap_item(ItemKind::Op);
        }

        // Speculative cast: "( type )" not followed by an operator.
        self.start_pp();
        let cast = if self.expect_pp(TokenKind::LParen, false)
            && self.parse_ty(false)
            && self.expect_pp(TokenKind::RParen, false)
            && !self.parse_op()
        {
            self.finish();
            self.start_pp();
            true
        } else {
            self.cancel();
            false
        };

        if self.parse_initializer() {
            // compound literal or plain initializer expression
        } else if cast && reference {
            let span = self.current_span();
            self.error(span, "cannot take a reference to a cast", true);
        } else if self.parse_op() {
            self.parse_expr_left(false);
            self.push_item(ItemKind::Expr);
        } else if self.expect_pp(TokenKind::UnaryAssign, false) {
            self.wrap_item(ItemKind::Op);
            self.parse_expr_left(false);
            self.push_item(ItemKind::Expr);
            self.wrap_item(ItemKind::Assignment);
        } else if self.expect_pp(TokenKind::LParen, false) {
            self.parse_expr(true, false);
            self.expect_pp(TokenKind::RParen, true);
            self.parse_addendums();
        } else if self.expect_pp(TokenKind::Name, false) {
            self.wrap_item(ItemKind::Name);
            self.parse_addendums();
            if self.expect_pp(TokenKind::LParen, false) {
                self.parse_args();
                self.parse_addendums();
                self.wrap_item(ItemKind::FnCall);
            }
        } else if self.expect_pp(TokenKind::Num, false) {
            self.wrap_item(ItemKind::LitNum);
        } else if self.expect_pp(TokenKind::Str, false) {
            self.wrap_item(ItemKind::LitStr);
        } else if self.expect_pp(TokenKind::Char, false) {
            self.wrap_item(ItemKind::LitChar);
        } else {
            if cast {
                self.finish();
                let span = self.current_span();
                self.error(span, "expected expression after cast", true);
                self.wrap_item(ItemKind::Cast);
                return true;
            }
            if optional {
                self.cancel();
                return false;
            }
            let span = self.current_span();
            self.error(span, "expected expression", true);
            return true;
        }

        if cast {
            self.finish();
            self.wrap_item(ItemKind::Cast);
        }
        true
    }

    /// Expression: operand, then ternary / assignment / flat operator
    /// chain, wrapped into a single expression item.
    pub(crate) fn parse_expr(&mut self, allow_comma: bool, optional: bool) {
        if !self.parse_expr_left(optional) {
            return;
        }
        if self.parsed_if {
            // A conditional branch directive interrupted the expression;
            // close what we have and restart on the other branch's text.
            self.parsed_if = false;
            self.push_item(ItemKind::Expr);
            self.parse_expr(allow_comma, optional);
            return;
        }
        if self.expect_start_pp(TokenKind::Question) {
            self.parse_expr(allow_comma, false);
            self.expect_pp(TokenKind::Colon, true);
            self.parse_expr(allow_comma, false);
            self.push_item(ItemKind::Ternary);
        } else if self.expect_start_pp(TokenKind::Assign) {
            self.push_item(ItemKind::Op);
            self.parse_expr(allow_comma, true);
            self.wrap_item(ItemKind::Assignment);
        } else if self.parse_op() {
            self.parse_expr(allow_comma, true);
        } else {
            self.start_pp();
            if self.expect_pp(TokenKind::UnaryAssign, false) {
                self.push_item(ItemKind::Op);
                self.wrap_item(ItemKind::Assignment);
            } else {
                self.finish();
            }
        }
        self.push_item(ItemKind::Expr);
        if allow_comma && self.expect_pp(TokenKind::Comma, false) {
            self.parse_expr(true, false);
        }
    }

    /// Type: optional struct/union/enum (inline body allowed), or a
    /// name, followed by a declarator. With `named` the declarator must
    /// include a name and the base type is wrapped separately.
    pub(crate) fn parse_ty(&mut self, named: bool) -> bool {
        self.start_pp();
        let is_union = self.expect_pp(TokenKind::Union, false);
        let is_struct = !is_union && self.expect_pp(TokenKind::Struct, false);
        let is_enum = !is_union && !is_struct && self.expect_pp(TokenKind::Enum, false);
        if self.expect_start_pp(TokenKind::Const) {
            self.push_item(ItemKind::TypeMod);
        }
        if is_union || is_struct || is_enum {
            if self.expect_start_pp(TokenKind::Name) {
                self.push_item(ItemKind::Name);
            }
            if self.expect_start_pp(TokenKind::LBrace) {
                if !self.expect_pp(TokenKind::RBrace, false) {
                    loop {
                        if self.stop {
                            break;
                        }
                        if is_enum {
                            self.start_pp();
                            self.expect_pp(TokenKind::Name, true);
                            self.push_item(ItemKind::Name);
                            if self.expect_start_pp(TokenKind::Assign) {
                                self.parse_expr(false, false);
                                self.push_item(ItemKind::EnumVal);
                            }
                            if !self.expect_pp(TokenKind::Comma, false) {
                                self.expect_pp(TokenKind::RBrace, true);
                                break;
                            }
                            if self.expect_pp(TokenKind::RBrace, false) {
                                break;
                            }
                        } else {
                            self.start_pp();
                            self.parse_ty(true);
                            while self.expect_pp(TokenKind::Comma, false) {
                                self.parse_aftertype(true);
                            }
                            self.expect_pp(TokenKind::Semi, true);
                            self.push_item(ItemKind::Field);
                            if self.expect_pp(TokenKind::RBrace, false) {
                                break;
                            }
                        }
                    }
                }
                self.push_item(ItemKind::Body);
            }
            if is_union {
                self.wrap_item(ItemKind::Union);
            } else if is_struct {
                self.wrap_item(ItemKind::Struct);
            } else {
                self.wrap_item(ItemKind::Enum);
            }
        } else if self.expect_start_pp(TokenKind::Name) {
            self.push_item(ItemKind::Name);
        } else {
            self.cancel();
            return false;
        }
        if named {
            self.wrap_item(ItemKind::Type);
        }
        if !self.parse_aftertype(named) {
            self.cancel();
            return false;
        }
        if named {
            self.finish();
        } else {
            self.push_item(ItemKind::Type);
        }
        true
    }

    /// Variable declaration statement: type, then one or more
    /// declarators with optional initializers, through the semicolon.
    pub(crate) fn parse_var(&mut self) -> bool {
        self.start_pp();
        if !self.parse_ty(true) {
            self.finish();
            return false;
        }
        // Reach back over the declarator parse_ty left pending so the
        // first var item adopts it.
        self.start_at_last_item();
        loop {
            if self.expect_pp(TokenKind::Assign, false) {
                if !self.parse_initializer() {
                    self.parse_expr(false, false);
                }
            } else if self.expect_pp(TokenKind::Semi, false) {
                self.push_item(ItemKind::Var);
                self.push_item(ItemKind::VarSet);
                return true;
            } else if self.expect_pp(TokenKind::Comma, false) {
                self.push_item(ItemKind::Var);
                self.start();
                if !self.parse_aftertype(true) {
                    let span = self.current_span();
                    self.error(span, "expected a name for this variable", true);
                }
            } else {
                self.finish();
                self.cancel();
                return false;
            }
        }
    }

    /// `{ ... }` block of statements.
    pub(crate) fn parse_block(&mut self) -> bool {
        if !self.expect_start_pp(TokenKind::LBrace) {
            return false;
        }
        while !self.expect_pp(TokenKind::RBrace, false) {
            if self.stop || self.peek_pp(TokenKind::Eof, 1) {
                self.expect_pp(TokenKind::RBrace, true);
                break;
            }
            self.parse_stmt();
        }
        self.push_item(ItemKind::Block);
        true
    }

    pub(crate) fn parse_stmt(&mut self) {
        self.start_pp();
        if self.expect_pp(TokenKind::If, false) {
            self.expect_pp(TokenKind::LParen, true);
            self.parse_expr(true, false);
            self.expect_pp(TokenKind::RParen, true);
            self.parse_stmt();
            loop {
                self.start_pp();
                if self.expect_pp(TokenKind::ElseIf, false) {
                    self.expect_pp(TokenKind::LParen, true);
                    self.parse_expr(true, false);
                    self.expect_pp(TokenKind::RParen, true);
                    self.parse_stmt();
                    self.push_item(ItemKind::ElseIf);
                } else if self.expect_pp(TokenKind::Else, false) {
                    self.parse_stmt();
                    self.push_item(ItemKind::Else);
                    break;
                } else {
                    self.finish();
                    break;
                }
            }
            self.push_item(ItemKind::If);
        } else if self.expect_pp(TokenKind::While, false) {
            self.expect_pp(TokenKind::LParen, true);
            self.parse_expr(true, false);
            self.expect_pp(TokenKind::RParen, true);
            self.parse_stmt();
            self.push_item(ItemKind::While);
        } else if self.expect_pp(TokenKind::Do, false) {
            self.parse_stmt();
            self.expect_pp(TokenKind::While, true);
            self.expect_pp(TokenKind::LParen, true);
            self.parse_expr(true, false);
            self.expect_pp(TokenKind::RParen, true);
            self.expect_pp(TokenKind::Semi, true);
            self.push_item(ItemKind::DoWhile);
        } else if self.expect_pp(TokenKind::For, false) {
            self.expect_pp(TokenKind::LParen, true);
            self.start();
            if !self.parse_var() {
                self.parse_expr(true, true);
                self.expect_pp(TokenKind::Semi, true);
            }
            self.push_item(ItemKind::Body);
            self.start();
            self.parse_expr(true, true);
            self.push_item(ItemKind::Body);
            self.expect_pp(TokenKind::Semi, true);
            self.start();
            self.parse_expr(true, true);
            self.push_item(ItemKind::Body);
            self.expect_pp(TokenKind::RParen, true);
            self.parse_stmt();
            self.push_item(ItemKind::For);
        } else if self.expect_pp(TokenKind::Switch, false) {
            self.expect_pp(TokenKind::LParen, true);
            self.parse_expr(true, false);
            self.expect_pp(TokenKind::RParen, true);
            self.start_pp();
            self.expect_pp(TokenKind::LBrace, true);
            while !self.expect_pp(TokenKind::RBrace, false) {
                if self.stop || self.peek_pp(TokenKind::Eof, 1) {
                    self.expect_pp(TokenKind::RBrace, true);
                    break;
                }
                if self.expect_start_pp(TokenKind::Case) {
                    self.parse_expr(false, false);
                    if self.expect_start_pp(TokenKind::Ellipsis) {
                        self.push_item(ItemKind::Op);
                        self.parse_expr(false, false);
                        self.wrap_item(ItemKind::Expr);
                    }
                    self.expect_pp(TokenKind::Colon, true);
                    self.push_item(ItemKind::Case);
                } else if self.expect_start_pp(TokenKind::Default) {
                    self.expect_pp(TokenKind::Colon, true);
                    self.push_item(ItemKind::Case);
                } else {
                    self.parse_stmt();
                }
            }
            self.push_item(ItemKind::Block);
            self.push_item(ItemKind::Switch);
        } else if self.expect_pp(TokenKind::Defer, false) {
            self.parse_expr(true, false);
            self.expect_pp(TokenKind::Semi, true);
            self.push_item(ItemKind::Defer);
        } else if self.expect_pp(TokenKind::Return, false) {
            if !self.expect_pp(TokenKind::Semi, false) {
                self.parse_expr(true, false);
                self.expect_pp(TokenKind::Semi, true);
            }
            self.push_item(ItemKind::Ret);
        } else if self.expect_pp(TokenKind::Break, false) {
            self.expect_pp(TokenKind::Semi, true);
            self.push_item(ItemKind::Break);
        } else if self.expect_pp(TokenKind::Goto, false) {
            self.start_pp();
            self.expect_pp(TokenKind::Name, true);
            self.push_item(ItemKind::Name);
            self.expect_pp(TokenKind::Semi, true);
            self.push_item(ItemKind::Goto);
        } else if self.peek_pp(TokenKind::Name, 1) && self.peek_is(TokenKind::Colon, 2) {
            self.expect_pp(TokenKind::Name, false);
            self.wrap_item(ItemKind::Name);
            self.expect_pp(TokenKind::Colon, true);
            self.push_item(ItemKind::Label);
        } else if self.parse_block() {
            self.finish();
        } else {
            if !self.parse_var() {
                self.parse_expr(true, true);
                self.expect_pp(TokenKind::Semi, true);
            }
            self.finish();
        }
    }

    /// Top-level declaration: typedef, type definition, function, or
    /// global variable.
    pub fn parse_decl(&mut self) -> bool {
        self.start_pp();
        if self.expect_pp(TokenKind::Typedef, false) {
            self.parse_ty(false);
            self.start_pp();
            self.expect_pp(TokenKind::Name, true);
            self.push_item(ItemKind::Name);
            self.expect_pp(TokenKind::Semi, true);
            self.push_item(ItemKind::Typedef);
            return true;
        }
        let is_static = self.expect_pp(TokenKind::Static, false);
        if is_static {
            self.expect_pp(TokenKind::Inline, false);
        }
        let is_inline = if is_static {
            false
        } else {
            let inline = self.expect_pp(TokenKind::Inline, false);
            if inline {
                self.expect_pp(TokenKind::Static, false);
            }
            inline
        };
        if self.parse_ty(false) {
            if self.expect_start_pp(TokenKind::Name) {
                self.push_item(ItemKind::Name);
                if self.expect_pp(TokenKind::LParen, false) {
                    self.start();
                    if !self.expect_pp(TokenKind::RParen, false) {
                        loop {
                            self.parse_arg();
                            if !self.expect_pp(TokenKind::Comma, false) {
                                self.expect_pp(TokenKind::RParen, true);
                                break;
                            }
                        }
                    }
                    self.push_item(ItemKind::Args);
                    if !self.parse_block() {
                        self.expect_pp(TokenKind::Semi, true);
                    }
                    self.push_item(ItemKind::Func);
                    return true;
                }
                self.cancel();
            } else if is_static || is_inline || !self.expect_pp(TokenKind::Semi, false) {
                self.cancel();
            } else {
                // bare type definition: `struct foo { ... };`
                self.finish();
                return true;
            }
        } else {
            self.cancel();
        }
        if self.parse_var() {
            return true;
        }
        let span = self.current_span();
        self.error(span, "expected a function, type, or variable", true);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::item::ItemId;
    use pretty_assertions::assert_eq;

    fn parse(src: &str) -> Parser {
        let mut p = Parser::new(src);
        p.parse();
        p
    }

    fn kinds(p: &Parser, ids: &[ItemId]) -> Vec<ItemKind> {
        ids.iter().map(|&i| p.arena[i].kind).collect()
    }

    #[test]
    fn function_shape() {
        let p = parse("int main(int argc) { return 0; }");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        assert_eq!(p.items.len(), 1);
        let func = p.items[0];
        assert_eq!(p.arena[func].kind, ItemKind::Func);
        assert_eq!(
            kinds(&p, &p.arena[func].body),
            vec![ItemKind::Type, ItemKind::Name, ItemKind::Args, ItemKind::Block]
        );
    }

    #[test]
    fn global_variable_with_initializer() {
        let p = parse("int x = 5, y;");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        let vs = p.items[0];
        assert_eq!(p.arena[vs].kind, ItemKind::VarSet);
        assert_eq!(
            kinds(&p, &p.arena[vs].body),
            vec![ItemKind::Type, ItemKind::Var, ItemKind::Var]
        );
        let var = p.arena[vs].body[1];
        assert_eq!(p.arena[p.arena[var].body[0]].kind, ItemKind::Declarator);
        assert_eq!(p.arena[p.arena[var].body[1]].kind, ItemKind::Expr);
    }

    #[test]
    fn struct_with_fields() {
        let p = parse("struct point { int x; int y; };");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        let ty = p.items[0];
        assert_eq!(p.arena[ty].kind, ItemKind::Type);
        let st = p.arena[ty].body[0];
        assert_eq!(p.arena[st].kind, ItemKind::Struct);
        let body = *p.arena[st].body.last().unwrap();
        assert_eq!(p.arena[body].kind, ItemKind::Body);
        assert_eq!(
            kinds(&p, &p.arena[body].body),
            vec![ItemKind::Field, ItemKind::Field]
        );
    }

    #[test]
    fn typedef_enum() {
        let p = parse("typedef enum { A, B = 2 } letters;");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        assert_eq!(p.arena[p.items[0]].kind, ItemKind::Typedef);
    }

    #[test]
    fn defer_statement() {
        let p = parse("void f() { defer free(x); return; }");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        let func = p.items[0];
        let block = *p.arena[func].body.last().unwrap();
        assert_eq!(
            kinds(&p, &p.arena[block].body),
            vec![ItemKind::Defer, ItemKind::Ret]
        );
    }

    #[test]
    fn cast_versus_parenthesized_expression() {
        let p = parse("void f() { x = (int)y; z = (a) + b; }");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        let func = p.items[0];
        let block = *p.arena[func].body.last().unwrap();
        let first = p.arena[block].body[0];
        let mut casts = 0;
        count_kind(&p, first, ItemKind::Cast, &mut casts);
        assert_eq!(casts, 1);
        let second = p.arena[block].body[1];
        let mut casts = 0;
        count_kind(&p, second, ItemKind::Cast, &mut casts);
        assert_eq!(casts, 0);
    }

    fn count_kind(p: &Parser, id: ItemId, kind: ItemKind, acc: &mut usize) {
        if p.arena[id].kind == kind {
            *acc += 1;
        }
        for &c in &p.arena[id].body {
            count_kind(p, c, kind, acc);
        }
    }

    #[test]
    fn flat_operator_chain_nests_rightward() {
        let p = parse("void f() { x = a + b * c; }");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        let func = p.items[0];
        let block = *p.arena[func].body.last().unwrap();
        let stmt = p.arena[block].body[0];
        let mut ops = 0;
        count_kind(&p, stmt, ItemKind::Op, &mut ops);
        // `=`, `+`, `*`
        assert_eq!(ops, 3);
    }

    #[test]
    fn labels_and_gotos() {
        let p = parse("void f() { top: x(); goto top; }");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        let func = p.items[0];
        let block = *p.arena[func].body.last().unwrap();
        assert_eq!(
            kinds(&p, &p.arena[block].body),
            vec![ItemKind::Label, ItemKind::Expr, ItemKind::Goto]
        );
    }

    #[test]
    fn switch_with_case_ranges() {
        let p = parse("void f(int x) { switch (x) { case 1 ... 3: break; default: break; } }");
        assert!(!p.has_fatal(), "{:?}", p.errors);
    }

    #[test]
    fn for_loop_clauses_are_wrapped() {
        let p = parse("void f() { for (int i = 0; i < 10; i++) g(i); }");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        let func = p.items[0];
        let block = *p.arena[func].body.last().unwrap();
        let f = p.arena[block].body[0];
        assert_eq!(p.arena[f].kind, ItemKind::For);
        assert_eq!(
            kinds(&p, &p.arena[f].body),
            vec![ItemKind::Body, ItemKind::Body, ItemKind::Body, ItemKind::Expr]
        );
    }

    #[test]
    fn empty_for_clauses_still_wrap() {
        let p = parse("void f() { for (;;) g(); }");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        let func = p.items[0];
        let block = *p.arena[func].body.last().unwrap();
        let f = p.arena[block].body[0];
        assert_eq!(p.arena[f].body.len(), 4);
    }

    #[test]
    fn function_pointer_field() {
        let p = parse("struct ops { void (*run)(int a); };");
        assert!(!p.has_fatal(), "{:?}", p.errors);
    }

    #[test]
    fn ternary_expression() {
        let p = parse("int x = a ? b : c;");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        let vs = p.items[0];
        let var = p.arena[vs].body[1];
        let init = p.arena[var].body[1];
        let mut terns = 0;
        count_kind(&p, init, ItemKind::Ternary, &mut terns);
        assert_eq!(terns, 1);
    }

    #[test]
    fn unterminated_block_reports_instead_of_hanging() {
        let p = parse("void f() { if (x) {");
        assert!(p.has_fatal());
    }

    #[test]
    fn macros_inside_functions() {
        let p = parse("#define TEN 10\nint f() { return TEN; }");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        let kinds: Vec<ItemKind> = p.items.iter().map(|&i| p.arena[i].kind).collect();
        assert!(kinds.contains(&ItemKind::Define));
        assert!(kinds.contains(&ItemKind::Func));
    }

    #[test]
    fn conditional_branches_both_parse() {
        let p = parse("#ifdef A\nint x;\n#else\nint y;\n#endif\n");
        assert!(!p.has_fatal(), "{:?}", p.errors);
        let tagged: Vec<(Option<u32>, u32)> = p
            .items
            .iter()
            .map(|&i| (p.arena[i].group, p.arena[i].branch))
            .collect();
        assert_eq!(tagged, vec![(Some(0), 0), (Some(0), 1)]);
    }
}
