//! Defer resolution.
//!
//! Two passes over the parsed tree. The tag pass finds scope blocks,
//! marking which ones belong to a function or a breakable construct,
//! and collects each function's labels. The resolution pass walks
//! statements in order, detaching `defer` statements into their scope
//! and recording an exit edge for every statement that leaves the
//! scope carrying cleanup obligations (`return`, `break`, and `goto`
//! out of the scope).
//!
//! Lowering then rewrites each scope. When every exit is structurally
//! identical and the scope already ends in one of them, the deferred
//! statements are emitted once at the scope tail in reverse
//! registration order, with synthesized labels so an exit that saw
//! only part of the defers jumps past the ones it must not run.
//! Otherwise the cleanup is duplicated in front of each exit, cloned
//! so every item keeps a single parent.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::parser::item::{is_special, ItemId, ItemKind};
use crate::parser::token::Span;
use crate::parser::Parser;

#[derive(Debug, Default, Clone)]
struct Scope {
    /// Deferred statement expressions, in registration order.
    deferred: Vec<ItemId>,
    exits: Vec<ExitEdge>,
    is_fn: bool,
    is_loop: bool,
}

#[derive(Debug, Clone)]
struct ExitEdge {
    /// The exiting statement.
    item: ItemId,
    /// How many defers of the recording scope were registered when the
    /// exit was reached; only those run on this path.
    defer_i: usize,
    /// The outermost scope the exit leaves from, for `return` and
    /// `break`, or the scope a `goto` lands in, which stays active.
    target: ItemId,
    /// Whether `target` itself is exited, so its defers run too.
    include_target: bool,
}

#[derive(Default)]
struct Resolver {
    scopes: FxHashMap<ItemId, Scope>,
    /// Per-function label tables; labels never cross functions.
    labels: FxHashMap<ItemId, FxHashMap<String, ItemId>>,
}

/// Resolve all defers in the parsed tree, rewriting it in place.
/// Problems (breaks with nothing to break out of, gotos to unknown
/// labels) are recorded as parser errors.
pub fn resolve(parser: &mut Parser) {
    let mut r = Resolver::default();
    r.tag(parser, None, None);
    r.process_items(parser, None);
}

impl Resolver {
    fn tag(&mut self, p: &Parser, owner: Option<ItemId>, current_fn: Option<ItemId>) {
        let list: Vec<ItemId> = match owner {
            Some(o) => p.arena[o].body.clone(),
            None => p.items.clone(),
        };
        for id in list {
            match p.arena[id].kind {
                ItemKind::Block => {
                    let parent_kind = p.arena[id].parent.map(|q| p.arena[q].kind);
                    let scope = Scope {
                        is_fn: parent_kind == Some(ItemKind::Func),
                        is_loop: matches!(
                            parent_kind,
                            Some(
                                ItemKind::While
                                    | ItemKind::DoWhile
                                    | ItemKind::For
                                    | ItemKind::Switch
                            )
                        ),
                        ..Scope::default()
                    };
                    self.scopes.insert(id, scope);
                    self.tag(p, Some(id), current_fn);
                }
                ItemKind::Func => {
                    self.labels.entry(id).or_default();
                    self.tag(p, Some(id), Some(id));
                }
                ItemKind::Label => {
                    if let Some(f) = current_fn {
                        if let Some(name_item) = p.real_child(id, 0) {
                            let name = p.item_text(name_item);
                            self.labels.entry(f).or_default().insert(name, id);
                        }
                    }
                }
                _ => {
                    if !p.arena[id].body.is_empty() {
                        self.tag(p, Some(id), current_fn);
                    }
                }
            }
        }
    }

    /// Nearest strictly-enclosing scope block of an item.
    fn block_of(&self, p: &Parser, mut id: ItemId) -> Option<ItemId> {
        while let Some(parent) = p.arena[id].parent {
            if self.scopes.contains_key(&parent) {
                return Some(parent);
            }
            id = parent;
        }
        None
    }

    fn enclosing_fn(&self, p: &Parser, mut id: ItemId) -> Option<ItemId> {
        while let Some(parent) = p.arena[id].parent {
            if p.arena[parent].kind == ItemKind::Func {
                return Some(parent);
            }
            id = parent;
        }
        None
    }

    fn item_span_start(&self, p: &Parser, id: ItemId) -> Span {
        p.arena[id].span().unwrap_or(Span { start: 0, end: 0 })
    }

    fn process_items(&mut self, p: &mut Parser, owner: Option<ItemId>) {
        let mut i = 0;
        loop {
            let id = match owner {
                Some(o) => match p.arena[o].body.get(i) {
                    Some(&x) => x,
                    None => break,
                },
                None => match p.items.get(i) {
                    Some(&x) => x,
                    None => break,
                },
            };
            match p.arena[id].kind {
                ItemKind::Block => self.process_scope(p, id),
                ItemKind::Defer => {
                    // Lexical lowering: a defer must be a direct child
                    // of the block whose exits it guards.
                    let block = owner.filter(|o| self.scopes.contains_key(o));
                    match (block, p.real_child(id, 0)) {
                        (Some(block), Some(expr)) => {
                            if let Some(sc) = self.scopes.get_mut(&block) {
                                sc.deferred.push(expr);
                            }
                            p.arena[block].body.remove(i);
                            continue;
                        }
                        _ => {
                            let span = self.item_span_start(p, id);
                            p.error(span, "defer must appear directly inside a block", true);
                        }
                    }
                }
                ItemKind::Ret => self.record_ret(p, id),
                ItemKind::Break => self.record_break(p, id),
                ItemKind::Goto => self.record_goto(p, id),
                _ => {
                    if !p.arena[id].body.is_empty() {
                        self.process_items(p, Some(id));
                    }
                }
            }
            i += 1;
        }
    }

    fn record_ret(&mut self, p: &mut Parser, id: ItemId) {
        let Some(current) = self.block_of(p, id) else { return };
        let mut target = Some(current);
        while let Some(t) = target {
            if self.scopes[&t].is_fn {
                break;
            }
            target = self.block_of(p, t);
        }
        let Some(target) = target else { return };
        self.record_exit(current, id, target, true);
    }

    fn record_break(&mut self, p: &mut Parser, id: ItemId) {
        let Some(current) = self.block_of(p, id) else { return };
        let mut target = Some(current);
        while let Some(t) = target {
            if self.scopes[&t].is_loop {
                break;
            }
            target = self.block_of(p, t);
        }
        match target {
            Some(target) => self.record_exit(current, id, target, true),
            None => {
                let span = self.item_span_start(p, id);
                p.error(span, "nothing to break out of", true);
            }
        }
    }

    fn record_goto(&mut self, p: &mut Parser, id: ItemId) {
        let Some(current) = self.block_of(p, id) else { return };
        let Some(name_item) = p.real_child(id, 0) else { return };
        let name = p.item_text(name_item);
        let label = self
            .enclosing_fn(p, id)
            .and_then(|f| self.labels.get(&f))
            .and_then(|table| table.get(&name))
            .copied();
        let Some(label) = label else {
            let span = self.item_span_start(p, id);
            p.error(
                span,
                format!("no label named `{}` in this function", name),
                true,
            );
            return;
        };
        let Some(label_scope) = self.block_of(p, label) else { return };
        // A jump that stays inside the current scope (or dives deeper)
        // runs no cleanup.
        if label_scope == current || p.is_descendant(current, label_scope) {
            return;
        }
        // The label's scope stays active, so its defers are kept.
        self.record_exit(current, id, label_scope, false);
    }

    fn record_exit(&mut self, current: ItemId, item: ItemId, target: ItemId, include_target: bool) {
        if let Some(sc) = self.scopes.get_mut(&current) {
            let defer_i = sc.deferred.len();
            sc.exits.push(ExitEdge {
                item,
                defer_i,
                target,
                include_target,
            });
        }
    }

    /// Deferred statements of the scopes between `block` (exclusive)
    /// and `target`, innermost first, each scope's in reverse
    /// registration order. `block`'s own defers are covered by the
    /// exit's `defer_i` slice.
    fn outer_cleanup_chain(&self, p: &Parser, block: ItemId, ex: &ExitEdge) -> Vec<ItemId> {
        let mut out = Vec::new();
        if block == ex.target {
            return out;
        }
        let mut s = self.block_of(p, block);
        while let Some(b) = s {
            // A scope that still contains the destination stays live;
            // for a goto into a sibling scope that is the common
            // ancestor, not the target itself.
            if !ex.include_target && (b == ex.target || p.is_descendant(b, ex.target)) {
                break;
            }
            out.extend(self.scopes[&b].deferred.iter().rev().copied());
            if b == ex.target {
                break;
            }
            s = self.block_of(p, b);
        }
        out
    }

    fn detach(&self, p: &mut Parser, item: ItemId) {
        if let Some(parent) = p.arena[item].parent {
            p.arena[parent].body.retain(|&c| c != item);
        }
    }

    fn process_scope(&mut self, p: &mut Parser, block: ItemId) {
        self.process_items(p, Some(block));

        let mut any = !self.scopes[&block].deferred.is_empty();
        if !any {
            let mut s = self.block_of(p, block);
            while let Some(b) = s {
                if !self.scopes[&b].deferred.is_empty() {
                    any = true;
                    break;
                }
                s = self.block_of(p, b);
            }
        }
        if !any {
            return;
        }

        let deferred = self.scopes[&block].deferred.clone();
        let exits = self.scopes[&block].exits.clone();
        let same = exits
            .windows(2)
            .all(|w| p.item_eq(w[0].item, w[1].item) && w[0].target == w[1].target);
        // Sharing a tail is only sound when the scope's last statement
        // is itself an exit that saw every defer: falling off the end
        // then wants exactly the same cleanup-and-exit sequence.
        let full = if same && !deferred.is_empty() {
            let tail = self.tail_stmt(p, block);
            exits
                .iter()
                .rev()
                .find(|e| e.defer_i == deferred.len() && Some(e.item) == tail)
                .cloned()
        } else {
            None
        };
        debug!(
            block,
            deferred = deferred.len(),
            exits = exits.len(),
            shared_tail = full.is_some(),
            "lowering scope"
        );

        match full {
            Some(full) => self.lower_shared_tail(p, block, &deferred, &exits, &full),
            None => {
                // Duplicate cleanup in front of each exit. The natural
                // tail still runs the scope's own defers, unless it is
                // unreachable.
                if !self.tail_always_exits(p, block) {
                    for &d in deferred.iter().rev() {
                        p.arena[block].body.push(d);
                        p.arena[d].parent = Some(block);
                    }
                }
                for ex in &exits {
                    self.insert_cleanup_before(p, block, ex);
                }
            }
        }
    }

    fn tail_stmt(&self, p: &Parser, block: ItemId) -> Option<ItemId> {
        p.arena[block]
            .body
            .iter()
            .rev()
            .copied()
            .find(|&c| !is_special(p.arena[c].kind))
    }

    fn lower_shared_tail(
        &mut self,
        p: &mut Parser,
        block: ItemId,
        deferred: &[ItemId],
        exits: &[ExitEdge],
        full: &ExitEdge,
    ) {
        // The tail exit anchors the shared cleanup sequence; every
        // other exit jumps into it at the right depth.
        self.detach(p, full.item);
        for di in (0..deferred.len()).rev() {
            let mut label_name: Option<String> = None;
            for ex in exits.iter().filter(|e| e.defer_i == di + 1) {
                if ex.item == full.item {
                    continue;
                }
                let name = match &label_name {
                    Some(name) => name.clone(),
                    None => {
                        let name = self.fresh_label(p, block, di);
                        let label = p.gen_item(ItemKind::Label, Some(block), Some(block), None);
                        let name_item = p.gen_item(
                            ItemKind::Name,
                            Some(label),
                            Some(block),
                            Some(name.clone()),
                        );
                        p.arena[label].body.push(name_item);
                        p.arena[block].body.push(label);
                        label_name = Some(name.clone());
                        name
                    }
                };
                self.replace_with_goto(p, ex.item, &name);
            }
            let d = deferred[di];
            p.arena[block].body.push(d);
            p.arena[d].parent = Some(block);
        }
        for d in self.outer_cleanup_chain(p, block, full) {
            let copy = p.clone_subtree(d, Some(block));
            p.arena[block].body.push(copy);
        }
        p.arena[block].body.push(full.item);
        p.arena[full.item].parent = Some(block);
        // Exits reached before any defer registered keep their place;
        // only enclosing scopes' cleanup applies to them.
        for ex in exits.iter().filter(|e| e.defer_i == 0) {
            self.insert_cleanup_before(p, block, ex);
        }
    }

    fn fresh_label(&mut self, p: &Parser, block: ItemId, di: usize) -> String {
        let mut name = format!("defer{}", di);
        if let Some(f) = self.enclosing_fn(p, block) {
            let table = self.labels.entry(f).or_default();
            while table.contains_key(&name) {
                name.push('_');
            }
            table.insert(name.clone(), block);
        }
        name
    }

    fn replace_with_goto(&mut self, p: &mut Parser, exit_item: ItemId, label: &str) {
        let Some(parent) = p.arena[exit_item].parent else { return };
        let Some(pos) = p.arena[parent].body.iter().position(|&c| c == exit_item) else {
            return;
        };
        let goto = p.gen_item(ItemKind::Goto, Some(parent), Some(exit_item), None);
        let name_item = p.gen_item(
            ItemKind::Name,
            Some(goto),
            Some(exit_item),
            Some(label.to_string()),
        );
        p.arena[goto].body.push(name_item);
        p.arena[parent].body[pos] = goto;
    }

    fn insert_cleanup_before(&mut self, p: &mut Parser, block: ItemId, ex: &ExitEdge) {
        let mut cleanup: Vec<ItemId> = Vec::new();
        cleanup.extend(self.scopes[&block].deferred[..ex.defer_i].iter().rev().copied());
        cleanup.extend(self.outer_cleanup_chain(p, block, ex));
        if cleanup.is_empty() {
            return;
        }
        let Some(parent) = p.arena[ex.item].parent else { return };
        let Some(pos) = p.arena[parent].body.iter().position(|&c| c == ex.item) else {
            return;
        };
        if self.scopes.contains_key(&parent) {
            let mut at = pos;
            for d in cleanup {
                let copy = p.clone_subtree(d, Some(parent));
                p.arena[parent].body.insert(at, copy);
                at += 1;
            }
        } else {
            // Single-statement position (unbraced if or loop body):
            // wrap the cleanup and the exit in a block.
            let wrap = p.gen_item(ItemKind::Block, Some(parent), Some(ex.item), None);
            p.arena[parent].body[pos] = wrap;
            for d in cleanup {
                let copy = p.clone_subtree(d, Some(wrap));
                p.arena[wrap].body.push(copy);
            }
            p.arena[wrap].body.push(ex.item);
            p.arena[ex.item].parent = Some(wrap);
        }
    }

    /// Whether control can never fall off the end of the block.
    fn tail_always_exits(&self, p: &Parser, block: ItemId) -> bool {
        let last = p.arena[block]
            .body
            .iter()
            .rev()
            .copied()
            .find(|&c| !is_special(p.arena[c].kind));
        match last {
            Some(last) => self.stmt_always_exits(p, last),
            None => false,
        }
    }

    /// A goto leaves its scope only when resolution recorded an exit
    /// edge for it; a jump to a label in the same scope keeps control
    /// inside, and the scope tail stays reachable.
    fn goto_exits(&self, id: ItemId) -> bool {
        self.scopes
            .values()
            .any(|s| s.exits.iter().any(|e| e.item == id))
    }

    fn stmt_always_exits(&self, p: &Parser, id: ItemId) -> bool {
        match p.arena[id].kind {
            ItemKind::Ret | ItemKind::Break => true,
            ItemKind::Goto => self.goto_exits(id),
            ItemKind::Block => self.tail_always_exits(p, id),
            ItemKind::If => {
                let mut reals = p.arena[id]
                    .body
                    .iter()
                    .copied()
                    .filter(|&c| !is_special(p.arena[c].kind));
                let _cond = reals.next();
                let Some(then) = reals.next() else { return false };
                if !self.stmt_always_exits(p, then) {
                    return false;
                }
                let mut has_else = false;
                for rest in reals {
                    let exits = match p.arena[rest].kind {
                        ItemKind::ElseIf => p
                            .real_child(rest, 1)
                            .map_or(false, |s| self.stmt_always_exits(p, s)),
                        ItemKind::Else => {
                            has_else = true;
                            p.real_child(rest, 0)
                                .map_or(false, |s| self.stmt_always_exits(p, s))
                        }
                        _ => true,
                    };
                    if !exits {
                        return false;
                    }
                }
                has_else
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolved(src: &str) -> Parser {
        let mut p = Parser::new(src);
        p.parse();
        assert!(!p.has_fatal(), "{:?}", p.errors);
        resolve(&mut p);
        p
    }

    fn fn_block(p: &Parser, n: usize) -> ItemId {
        let func = p
            .items
            .iter()
            .copied()
            .filter(|&i| p.arena[i].kind == ItemKind::Func)
            .nth(n)
            .unwrap();
        *p.arena[func].body.last().unwrap()
    }

    fn body_kinds(p: &Parser, block: ItemId) -> Vec<ItemKind> {
        p.arena[block].body.iter().map(|&c| p.arena[c].kind).collect()
    }

    fn expr_texts(p: &Parser, block: ItemId) -> Vec<String> {
        p.arena[block]
            .body
            .iter()
            .filter(|&&c| p.arena[c].kind == ItemKind::Expr)
            .map(|&c| p.item_text(c))
            .collect()
    }

    #[test]
    fn single_exit_moves_defer_to_tail() {
        let p = resolved("int f() { defer g(); return 1; }");
        let block = fn_block(&p, 0);
        assert_eq!(body_kinds(&p, block), vec![ItemKind::Expr, ItemKind::Ret]);
        assert!(!p.has_fatal(), "{:?}", p.errors);
        assert!(p.item_text(p.arena[block].body[0]).contains("g()"));
    }

    #[test]
    fn reverse_registration_order() {
        let p = resolved("int f() { defer a(); defer b(); return 1; }");
        let block = fn_block(&p, 0);
        assert_eq!(expr_texts(&p, block), vec!["b()", "a()"]);
    }

    #[test]
    fn braced_inner_exit_gets_cleanup_copy() {
        let p = resolved("int f(int c) { defer g(); if (c) { return 1; } return 1; }");
        let block = fn_block(&p, 0);
        assert_eq!(
            body_kinds(&p, block),
            vec![ItemKind::If, ItemKind::Expr, ItemKind::Ret]
        );
        let if_item = p.arena[block].body[0];
        let inner = p.arena[if_item]
            .body
            .iter()
            .copied()
            .find(|&c| p.arena[c].kind == ItemKind::Block)
            .unwrap();
        // inner return leaves both scopes, so g() was copied in front
        assert_eq!(body_kinds(&p, inner), vec![ItemKind::Expr, ItemKind::Ret]);
        assert!(p.item_text(p.arena[inner].body[0]).contains("g()"));
    }

    #[test]
    fn unbraced_exit_wraps_in_block() {
        let p = resolved("int f(int c) { defer g(); if (c) return 1; return 2; }");
        let block = fn_block(&p, 0);
        let if_item = p.arena[block].body[0];
        assert_eq!(p.arena[if_item].kind, ItemKind::If);
        // the bare return slot became a block holding g() then return
        let wrap = p.arena[if_item]
            .body
            .iter()
            .copied()
            .find(|&c| p.arena[c].kind == ItemKind::Block)
            .unwrap();
        assert_eq!(body_kinds(&p, wrap), vec![ItemKind::Expr, ItemKind::Ret]);
    }

    #[test]
    fn partial_registration_jumps_past_later_defers() {
        let p = resolved("int f(int c) { defer a(); if (c) return 0; defer b(); return 0; }");
        let block = fn_block(&p, 0);
        assert_eq!(
            body_kinds(&p, block),
            vec![
                ItemKind::If,
                ItemKind::Expr,
                ItemKind::Label,
                ItemKind::Expr,
                ItemKind::Ret
            ]
        );
        assert_eq!(expr_texts(&p, block), vec!["b()", "a()"]);
        let label = p.arena[block]
            .body
            .iter()
            .copied()
            .find(|&c| p.arena[c].kind == ItemKind::Label)
            .unwrap();
        assert_eq!(p.item_text(p.real_child(label, 0).unwrap()), "defer0");
        // the early return became a jump into the tail
        let if_item = p.arena[block].body[0];
        assert!(p.arena[if_item]
            .body
            .iter()
            .any(|&c| p.arena[c].kind == ItemKind::Goto));
    }

    #[test]
    fn nested_scopes_run_outer_cleanup() {
        let p = resolved("int f() { defer a(); { defer b(); return 1; } }");
        let block = fn_block(&p, 0);
        let inner = p.arena[block]
            .body
            .iter()
            .copied()
            .find(|&c| p.arena[c].kind == ItemKind::Block)
            .unwrap();
        assert_eq!(expr_texts(&p, inner), vec!["b()", "a()"]);
        // the outer tail is unreachable, so a() is not repeated there
        assert_eq!(body_kinds(&p, block), vec![ItemKind::Block]);
    }

    #[test]
    fn break_targets_enclosing_loop() {
        let p = resolved("void f() { while (1) { defer g(); break; } }");
        let block = fn_block(&p, 0);
        let while_item = p.arena[block].body[0];
        let loop_block = p.arena[while_item]
            .body
            .iter()
            .copied()
            .find(|&c| p.arena[c].kind == ItemKind::Block)
            .unwrap();
        assert_eq!(
            body_kinds(&p, loop_block),
            vec![ItemKind::Expr, ItemKind::Break]
        );
    }

    #[test]
    fn break_outside_loop_is_fatal() {
        let mut p = Parser::new("void f() { defer g(); break; }");
        p.parse();
        assert!(!p.has_fatal(), "{:?}", p.errors);
        resolve(&mut p);
        assert!(p.has_fatal());
    }

    #[test]
    fn goto_within_scope_runs_no_cleanup() {
        let p = resolved("void f() { defer g(); top: x(); goto top; }");
        let block = fn_block(&p, 0);
        assert_eq!(
            body_kinds(&p, block),
            vec![ItemKind::Label, ItemKind::Expr, ItemKind::Goto, ItemKind::Expr]
        );
    }

    #[test]
    fn goto_to_a_sibling_scope_skips_shared_ancestors() {
        let p = resolved("void f() { defer o(); { defer a(); goto l; } { l: x(); } }");
        let block = fn_block(&p, 0);
        let first = p.arena[block]
            .body
            .iter()
            .copied()
            .find(|&c| p.arena[c].kind == ItemKind::Block)
            .unwrap();
        // control never leaves the function scope, so only a() runs
        // before the jump
        assert_eq!(body_kinds(&p, first), vec![ItemKind::Expr, ItemKind::Goto]);
        assert_eq!(expr_texts(&p, first), vec!["a()"]);
        // the function tail stays reachable and keeps its own defer
        assert_eq!(expr_texts(&p, block), vec!["o()"]);
    }

    #[test]
    fn goto_to_unknown_label_is_fatal() {
        let mut p = Parser::new("void f() { goto nowhere; }");
        p.parse();
        resolve(&mut p);
        assert!(p.has_fatal());
    }

    #[test]
    fn goto_out_of_scope_inserts_cleanup() {
        let p = resolved("void f() { top: x(); { defer g(); goto top; } }");
        let block = fn_block(&p, 0);
        let inner = p.arena[block]
            .body
            .iter()
            .copied()
            .find(|&c| p.arena[c].kind == ItemKind::Block)
            .unwrap();
        // the goto leaves the inner scope but not the function, so
        // only g() runs before it
        assert_eq!(body_kinds(&p, inner), vec![ItemKind::Expr, ItemKind::Goto]);
    }

    #[test]
    fn synthesized_labels_avoid_collisions() {
        let p = resolved(
            "int f(int c) { defer0: x(); defer a(); if (c) return 0; defer b(); return 0; }",
        );
        let block = fn_block(&p, 0);
        let labels: Vec<String> = p.arena[block]
            .body
            .iter()
            .filter(|&&c| p.arena[c].kind == ItemKind::Label)
            .map(|&c| p.item_text(p.real_child(c, 0).unwrap()))
            .collect();
        assert!(labels.contains(&"defer0_".to_string()), "{:?}", labels);
    }

    #[test]
    fn unreachable_tail_skips_defers() {
        let p = resolved("int f(int c) { defer g(); if (c) { return 1; } else { return 2; } }");
        let block = fn_block(&p, 0);
        assert_eq!(body_kinds(&p, block), vec![ItemKind::If]);
    }
}
