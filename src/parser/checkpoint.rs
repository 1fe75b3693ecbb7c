//! Speculative-parse checkpoints.
//!
//! The grammar tries alternatives by saving the parser state, parsing,
//! and either wrapping the consumed region into an item or cancelling.
//! A checkpoint is a handful of indices; rolling back truncates the
//! item arena and pending list and rewinds the token read position.
//! Tokens themselves are never discarded on cancel, so the re-parse of
//! a cancelled region reuses them from the cache.
//!
//! Every `start` must be matched by exactly one of `cancel`, `finish`,
//! or an item push. Unbalanced saves are a grammar bug.

use crate::parser::item::{ItemId, ItemKind, ItemSource};
use crate::parser::token::{Span, TokenKind};
use crate::parser::Parser;

#[derive(Debug, Clone)]
pub struct Save {
    pub(crate) tok_i: usize,
    /// Length of the pending-items list.
    pub(crate) item_i: usize,
    /// Arena high-water mark.
    pub(crate) pool_i: usize,
    pub(crate) expansions_i: usize,
    /// Snapshot of the macro expansion frame stack.
    pub(crate) frames: Vec<u32>,
}

impl Parser {
    pub(crate) fn save_state(&mut self) -> Save {
        // Park the active expansion's cursor so a restore can resume it.
        if let Some(&top) = self.expansion_stack.last() {
            self.expansions[top as usize].cursor = self.cursor;
        }
        Save {
            tok_i: self.tok_i,
            item_i: self.items.len(),
            pool_i: self.arena.len(),
            expansions_i: self.expansions_i,
            frames: self.expansion_stack.clone(),
        }
    }

    /// Open a checkpoint.
    pub fn start(&mut self) {
        let save = self.save_state();
        self.saves.push(save);
    }

    /// Open a checkpoint positioned just before the next token, if it
    /// has the given kind; the token is consumed.
    pub(crate) fn expect_start(&mut self, kind: TokenKind) -> bool {
        if !self.expect(kind, false) {
            return false;
        }
        let mut save = self.save_state();
        save.tok_i -= 1;
        self.saves.push(save);
        true
    }

    /// Discard the top checkpoint and roll the parser back to it.
    pub fn cancel(&mut self) {
        let Some(save) = self.saves.pop() else { return };
        self.restore(&save);
    }

    /// Discard the top checkpoint, keeping everything parsed under it.
    pub fn finish(&mut self) {
        self.saves.pop();
    }

    fn restore(&mut self, save: &Save) {
        self.tok_i = save.tok_i;
        self.arena.truncate(save.pool_i);
        self.items.truncate(save.item_i);
        self.expansions_i = save.expansions_i;
        if !save.frames.is_empty() {
            self.expansion_stack = save.frames.clone();
            if let Some(&top) = self.expansion_stack.last() {
                self.buf = crate::parser::token::BufferId::Expansion(top);
                self.cursor = self.expansions[top as usize].cursor;
            }
        } else if !self.expansion_stack.is_empty() {
            // The speculation entered one or more expansions; back out
            // to the source buffer.
            self.expansion_stack.clear();
            self.buf = crate::parser::token::BufferId::Source;
            self.cursor = self.source_cursor;
        }
        // Otherwise lexing never left the buffer the save was taken in;
        // the cursor stays at the scan frontier and rewound tokens are
        // served from the cache.
    }

    /// Wrap everything consumed since the innermost checkpoint into a
    /// new item, adopting the items parsed under it as children. The
    /// checkpoint stays open so the caller can wrap again.
    pub(crate) fn wrap_item(&mut self, kind: ItemKind) -> ItemId {
        self.wrap_inner(kind, true)
    }

    /// `wrap_item`, then close the checkpoint.
    pub(crate) fn push_item(&mut self, kind: ItemKind) -> ItemId {
        let id = self.wrap_inner(kind, true);
        self.saves.pop();
        id
    }

    /// Like `push_item` but the new item is not added to the pending
    /// list. Used for conditional branch directives, which live in
    /// their group's branch table rather than the item tree.
    pub(crate) fn push_item_oob(&mut self, kind: ItemKind) -> ItemId {
        let id = self.wrap_inner(kind, false);
        self.saves.pop();
        id
    }

    /// Open a checkpoint that reaches back to cover the most recently
    /// pushed pending item, so a wrap adopts it too.
    pub(crate) fn start_at_last_item(&mut self) {
        let mut save = self.save_state();
        if let Some(&last) = self.items.last() {
            save.item_i = self.items.len() - 1;
            if let ItemSource::Tokens(span) = self.arena[last].source {
                if !span.is_empty() {
                    save.tok_i = span.start as usize;
                }
            }
        }
        self.saves.push(save);
    }

    fn wrap_inner(&mut self, kind: ItemKind, pending: bool) -> ItemId {
        if self.saves.is_empty() {
            // Error recovery can reach a wrap with no open checkpoint;
            // synthesize an empty one at the current position.
            self.start();
        }
        let top = self.saves.len() - 1;
        let (start_tok, item_i) = (self.saves[top].tok_i, self.saves[top].item_i);
        let span = Span {
            start: start_tok as u32,
            end: self.tok_i.saturating_sub(1) as u32,
        };
        let group = self.current_group;
        let branch = group.map_or(0, |g| self.groups[g as usize].branch_pos);
        let id = self.arena.len();
        let body: Vec<ItemId> = self.items.split_off(item_i.min(self.items.len()));
        self.arena.push(crate::parser::item::Item {
            kind,
            source: ItemSource::Tokens(span),
            body: Vec::new(),
            parent: None,
            group,
            branch,
        });
        for &child in &body {
            self.arena[child].parent = Some(id);
        }
        self.arena[id].body = body;
        if pending {
            self.items.push(id);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::token::TokenKind;

    #[test]
    fn cancel_rewinds_position_and_items() {
        let mut p = Parser::new("foo bar baz");
        p.expect(TokenKind::Name, false);
        let pos = p.position();
        let arena_len = p.arena.len();
        p.start();
        p.expect(TokenKind::Name, false);
        p.wrap_item(ItemKind::Name);
        p.cancel();
        assert_eq!(p.position(), pos);
        assert_eq!(p.arena.len(), arena_len);
        assert!(p.items.is_empty());
    }

    #[test]
    fn cancel_keeps_scanned_tokens() {
        let mut p = Parser::new("foo bar");
        p.start();
        p.expect(TokenKind::Name, false);
        p.expect(TokenKind::Name, false);
        let scanned = p.tokens.len();
        p.cancel();
        assert_eq!(p.tokens.len(), scanned);
        assert_eq!(p.position(), 0);
    }

    #[test]
    fn wrap_adopts_pending_children() {
        let mut p = Parser::new("a b");
        p.start();
        p.start();
        p.expect(TokenKind::Name, false);
        let a = p.push_item(ItemKind::Name);
        p.start();
        p.expect(TokenKind::Name, false);
        let b = p.push_item(ItemKind::Name);
        let outer = p.push_item(ItemKind::Expr);
        assert_eq!(p.arena[outer].body, vec![a, b]);
        assert_eq!(p.arena[a].parent, Some(outer));
        assert_eq!(p.arena[b].parent, Some(outer));
        assert_eq!(p.items, vec![outer]);
    }

    #[test]
    fn nested_cancel_restores_outer_view() {
        let mut p = Parser::new("x y z");
        p.start();
        p.expect(TokenKind::Name, false);
        p.start();
        p.expect(TokenKind::Name, false);
        p.cancel();
        // Outer checkpoint still wraps only what it saw.
        p.wrap_item(ItemKind::Expr);
        let item = *p.items.last().unwrap();
        let span = p.arena[item].span().unwrap();
        assert_eq!(span.start, 0);
        assert_eq!(span.end, 0);
        p.finish();
    }
}
