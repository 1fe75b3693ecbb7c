//! Printing of the item tree back to C source.
//!
//! Most items are reproduced verbatim from their token spans, which
//! carries comments, spacing and macro invocations through untouched.
//! The printer only re-enters the constructs the resolver rewrites:
//! functions, blocks and control statements. Everything the resolver
//! moved or synthesized is re-aligned with `#line` directives so
//! downstream compiler diagnostics still point at the original file.
//!
//! Three pieces of bookkeeping run alongside the tree walk:
//!
//! * a token frontier, from which the gap to the next item is replayed
//!   (whitespace and comments echoed, dropped tokens skipped, runs of
//!   three or more newlines collapsed into a `#line` directive);
//! * conditional-group state, which interleaves `#if`/`#elif`/`#else`/
//!   `#endif` lines between items so every parsed branch reappears in
//!   its original position;
//! * a macro suppression depth. A macro call prints its invocation as
//!   written, then mutes every item parsed from its expansion until the
//!   matching end-of-expansion marker.

use std::fmt;

use tracing::trace;

use crate::parser::{is_special, BufferId, ItemId, ItemKind, Parser};

/// Print the resolved tree of `p` as C source. `fname` is the file name
/// quoted in `#line` directives.
pub fn emit_string(p: &Parser, fname: &str) -> String {
    let mut e = Emitter {
        p,
        fname: fname.replace('"', "\\\""),
        out: String::with_capacity(p.source.len() + p.source.len() / 4),
        tok: None,
        space: true,
        newline: true,
        excess_newline: 0,
        gen: false,
        macro_depth: 0,
        current_group: None,
        branch_pos: vec![-1; p.groups.len()],
    };
    let roots = p.items.clone();
    for id in roots {
        e.emit_node(id);
    }
    e.close_groups();
    if !e.out.ends_with('\n') {
        e.out.push('\n');
    }
    e.out
}

/// Like [`emit_string`], but writes into any formatter sink.
pub fn emit_to<W: fmt::Write>(p: &Parser, fname: &str, out: &mut W) -> fmt::Result {
    out.write_str(&emit_string(p, fname))
}

struct Emitter<'a> {
    p: &'a Parser,
    fname: String,
    out: String,
    /// Last token whose text reached the output, or `None` when the
    /// source position is unknown (start of file, after generated code).
    tok: Option<usize>,
    /// Last emitted character was a space; suppress echoed spaces.
    space: bool,
    /// Output sits at the start of a line.
    newline: bool,
    /// Newlines already emitted beyond what the source accounts for;
    /// consumed instead of echoing further source newlines.
    excess_newline: u32,
    /// Inside a run of generated items.
    gen: bool,
    /// Nesting depth of macro expansions being suppressed.
    macro_depth: u32,
    current_group: Option<u32>,
    /// Highest branch index already opened per group, -1 when closed.
    branch_pos: Vec<i64>,
}

impl Emitter<'_> {
    fn kind(&self, id: ItemId) -> ItemKind {
        self.p.arena[id].kind
    }

    /// Raw append with the newline/space dedup discipline.
    fn emits(&mut self, s: &str) {
        if self.macro_depth > 0 {
            return;
        }
        let mut s = s;
        if s.starts_with('\n') && (self.excess_newline > 0 || self.newline) {
            s = &s[1..];
            self.excess_newline = self.excess_newline.saturating_sub(1);
        }
        if s.is_empty() {
            return;
        }
        if s.ends_with('\n') {
            self.excess_newline += 1;
            self.newline = true;
            self.space = false;
        } else if s.ends_with(' ') {
            self.space = true;
        } else {
            self.newline = false;
            self.space = false;
        }
        self.out.push_str(s);
    }

    fn line_of(&self, byte: u32) -> usize {
        self.p.source[..(byte as usize).min(self.p.source.len())]
            .bytes()
            .filter(|&b| b == b'\n')
            .count()
            + 1
    }

    fn line_spec(&mut self, line: usize, generated: bool) {
        if !self.newline {
            self.out.push('\n');
        }
        if generated {
            self.out.push_str("#line 0 \"(generated)\"\n");
        } else {
            self.out.push_str(&format!("#line {} \"{}\"\n", line, self.fname));
        }
        self.newline = true;
        self.space = false;
        self.excess_newline = 0;
    }

    /// Replay the source gap between the frontier and `tok_i`:
    /// whitespace and comments are echoed, dropped token bytes are
    /// skipped, and long blank runs collapse into a `#line` directive.
    fn flush_whitespace(&mut self, tok_i: usize) {
        if self.macro_depth > 0 {
            return;
        }
        let p = self.p;
        let Some(prev) = self.tok else {
            self.tok = Some(tok_i);
            return;
        };
        if prev == tok_i {
            return;
        }
        self.tok = Some(tok_i);
        let (a, b) = (p.tokens[prev], p.tokens[tok_i]);
        if a.buf != BufferId::Source || b.buf != BufferId::Source || b.span.start < a.span.end() {
            return;
        }
        let gap = &p.source[a.span.end() as usize..b.span.start as usize];
        if gap.bytes().filter(|&c| c == b'\n').count() >= 3 {
            let line = self.line_of(b.span.start);
            self.line_spec(line, false);
            let tail = &gap[gap.rfind('\n').map_or(0, |i| i + 1)..];
            for ch in tail.chars().filter(|&c| c == ' ' || c == '\t') {
                self.out.push(ch);
                self.newline = false;
                self.space = ch == ' ';
            }
            return;
        }
        let bytes = gap.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    if self.excess_newline > 0 {
                        self.excess_newline -= 1;
                    } else {
                        self.out.push('\n');
                    }
                    self.newline = true;
                    self.space = false;
                    i += 1;
                }
                b' ' | b'\t' | b'\r' => {
                    if !(self.space && bytes[i] == b' ') {
                        self.out.push(bytes[i] as char);
                        self.newline = false;
                        self.space = bytes[i] == b' ';
                    }
                    i += 1;
                }
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    let end = gap[i..].find('\n').map_or(bytes.len(), |k| i + k);
                    self.out.push_str(&gap[i..end]);
                    self.newline = false;
                    self.space = false;
                    i = end;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    let end = gap[i..].find("*/").map_or(bytes.len(), |k| i + k + 2);
                    self.out.push_str(&gap[i..end]);
                    self.newline = false;
                    self.space = false;
                    i = end;
                }
                _ => i += 1,
            }
        }
    }

    /// Item text straight from the source buffer. Spans whose endpoints
    /// sit in expansion buffers contribute only their source-resident
    /// portion; a fully expanded span prints nothing, its invocation
    /// having been printed by the owning macro-call item.
    fn print_verbatim(&mut self, id: ItemId) {
        if self.macro_depth > 0 {
            return;
        }
        let p = self.p;
        let item = &p.arena[id];
        let (text, frontier): (&str, Option<usize>) = match item.span() {
            None => {
                let text = p.item_text(id);
                if text.is_empty() {
                    return;
                }
                self.push_text(&text);
                return;
            }
            Some(span) => {
                if span.is_empty() {
                    return;
                }
                let range = span.start as usize..=span.end as usize;
                if *range.end() >= p.tokens.len() {
                    return;
                }
                let first = range.clone().find(|&i| p.tokens[i].buf == BufferId::Source);
                let last = range.clone().rev().find(|&i| p.tokens[i].buf == BufferId::Source);
                match (first, last) {
                    (Some(f), Some(l)) if f <= l => {
                        let from = p.tokens[f].span.start as usize;
                        let to = p.tokens[l].span.end() as usize;
                        (&p.source[from..to], Some(l))
                    }
                    _ => return,
                }
            }
        };
        if text.is_empty() {
            return;
        }
        self.push_text(text);
        if frontier.is_some() {
            self.tok = frontier;
        }
    }

    fn push_text(&mut self, text: &str) {
        self.out.push_str(text);
        if text.ends_with('\n') {
            self.newline = true;
            self.excess_newline += 1;
            self.space = false;
        } else if text.ends_with(' ') {
            self.space = true;
        } else {
            self.newline = false;
            self.space = false;
        }
    }

    /// Position the output at `id`: print any pending conditional
    /// directives, then either replay the whitespace gap or, when the
    /// item is generated or out of source order, resynchronize with a
    /// `#line` directive.
    fn emit_node(&mut self, id: ItemId) {
        if self.macro_depth == 0 {
            self.sync_groups(id);
            self.align_item(id);
        }
        self.emit_item(id);
    }

    fn align_item(&mut self, id: ItemId) {
        let item = &self.p.arena[id];
        if item.is_generated() {
            if !self.gen {
                self.line_spec(0, true);
                self.tok = None;
                self.gen = true;
            } else {
                self.newline = false;
                self.excess_newline = 0;
                self.space = false;
            }
            return;
        }
        let Some(span) = item.span() else { return };
        if span.is_empty() {
            return;
        }
        let start = span.start as usize;
        if start >= self.p.tokens.len() || self.p.tokens[start].buf != BufferId::Source {
            return;
        }
        self.gen = false;
        match self.tok {
            Some(prev) if prev <= start => self.flush_whitespace(start),
            _ => {
                let line = self.line_of(self.p.tokens[start].span.start);
                self.line_spec(line, false);
                self.tok = Some(start);
            }
        }
    }

    /// Open, switch or close conditional groups so that `id` lands in
    /// the branch it was parsed under.
    fn sync_groups(&mut self, id: ItemId) {
        let target = self.p.arena[id].group;
        if target == self.current_group {
            if let Some(g) = target {
                let branch = self.p.arena[id].branch;
                self.switch_branch(g, branch);
            }
            return;
        }
        trace!(item = id, ?target, current = ?self.current_group, "conditional transition");
        // Chain of groups to open, innermost first, stopping at the
        // deepest group shared with the currently open chain.
        let mut chain: Vec<(u32, u32)> = Vec::new();
        let mut g = target;
        let mut reach = self.p.arena[id].branch;
        let mut common = None;
        let mut common_reach = 0;
        'walk: while let Some(gi) = g {
            let mut c = self.current_group;
            while let Some(ci) = c {
                if ci == gi {
                    common = Some(gi);
                    common_reach = reach;
                    break 'walk;
                }
                c = self.p.groups[ci as usize].parent;
            }
            chain.push((gi, reach));
            reach = self.p.groups[gi as usize].parent_branch;
            g = self.p.groups[gi as usize].parent;
        }
        let mut c = self.current_group;
        while c != common {
            let ci = c.expect("open group chain must reach the common ancestor");
            self.emits("\n#endif\n");
            self.branch_pos[ci as usize] = -1;
            c = self.p.groups[ci as usize].parent;
        }
        if let Some(ci) = common {
            self.switch_branch(ci, common_reach);
        }
        for &(gi, branch) in chain.iter().rev() {
            self.branch_pos[gi as usize] = -1;
            self.switch_branch(gi, branch);
        }
        self.current_group = target;
    }

    /// Print the branch directives of `g` from the last opened branch
    /// up to and including `to`. Never regresses: an item tagged with an
    /// earlier branch than the frontier (a resolver clone) prints into
    /// the branch that is already open.
    fn switch_branch(&mut self, g: u32, to: u32) {
        while self.branch_pos[g as usize] < to as i64 {
            self.branch_pos[g as usize] += 1;
            let i = self.branch_pos[g as usize] as usize;
            let item = self.p.groups[g as usize].branches[i].item;
            self.align_item(item);
            self.emit_item(item);
        }
    }

    /// Close conditional groups opened by a block's children before the
    /// closing brace is printed.
    fn sync_exit(&mut self, id: ItemId) {
        let target = self.p.arena[id].group;
        let mut c = self.current_group;
        while c != target {
            let Some(ci) = c else { break };
            self.emits("\n#endif\n");
            self.branch_pos[ci as usize] = -1;
            c = self.p.groups[ci as usize].parent;
        }
        self.current_group = c;
    }

    fn close_groups(&mut self) {
        let mut c = self.current_group;
        while let Some(ci) = c {
            self.emits("\n#endif\n");
            self.branch_pos[ci as usize] = -1;
            c = self.p.groups[ci as usize].parent;
        }
        self.current_group = None;
    }

    /// Emit transparent items until the next structural child, which is
    /// returned unemitted.
    fn until_real(&mut self, kids: &[ItemId], i: &mut usize) -> Option<ItemId> {
        while *i < kids.len() {
            let id = kids[*i];
            *i += 1;
            if is_special(self.kind(id)) {
                self.emit_node(id);
            } else {
                return Some(id);
            }
        }
        None
    }

    /// Print a literal `(` whose source counterpart sits in the gap
    /// before `next`: the gap is replayed first so the paren keeps its
    /// original spacing.
    fn open_paren(&mut self, next: Option<ItemId>) {
        if self.macro_depth == 0 {
            if let Some(span) = next.and_then(|id| self.p.arena[id].span()) {
                let start = span.start as usize;
                if !span.is_empty()
                    && start < self.p.tokens.len()
                    && self.p.tokens[start].buf == BufferId::Source
                    && self.tok.map_or(false, |t| t <= start)
                {
                    self.flush_whitespace(start);
                }
            }
        }
        self.emits("(");
    }

    /// Expression statements need their terminating semicolon re-added;
    /// every other statement kind carries it in its span.
    fn emit_stmt(&mut self, id: ItemId) {
        let kind = self.kind(id);
        self.emit_node(id);
        if kind == ItemKind::Expr {
            self.emits(";");
        }
    }

    /// Track expansion begin/end markers inside a subtree the printer
    /// does not descend into, so suppression ends where parsing did.
    fn scan_macro_bounds(&mut self, id: ItemId) {
        let kids = self.p.arena[id].body.clone();
        for c in kids {
            if self.macro_depth == 0 {
                return;
            }
            match self.kind(c) {
                ItemKind::MacroCall => {
                    if !self.intrinsic_call(c) {
                        self.macro_depth += 1;
                    }
                }
                ItemKind::MacroEof => self.macro_depth -= 1,
                _ => {}
            }
            self.scan_macro_bounds(c);
        }
    }

    /// Intrinsic calls pass through without expansion and never mute
    /// the printer.
    fn intrinsic_call(&self, id: ItemId) -> bool {
        self.p
            .real_child(id, 0)
            .map_or(false, |n| self.p.item_text(n).starts_with("__"))
    }

    fn emit_item(&mut self, id: ItemId) {
        use ItemKind::*;
        let generated = self.p.arena[id].is_generated();
        match self.kind(id) {
            Include | Define | Dir | IfDir | IfDef | ElifDir | ElseDir => {
                self.emits("\n");
                self.print_verbatim(id);
                self.emits("\n");
            }
            MacroCall => {
                if self.macro_depth > 0 {
                    self.macro_depth += 1;
                } else {
                    self.print_verbatim(id);
                    if !self.intrinsic_call(id) {
                        self.macro_depth += 1;
                    }
                }
            }
            MacroEof => self.macro_depth = self.macro_depth.saturating_sub(1),
            Func => self.emit_func(id),
            Block => self.emit_block(id),
            Body => self.emit_body(id),
            If => {
                let kids = self.p.arena[id].body.clone();
                let mut i = 0;
                self.emits("if");
                let cond = self.until_real(&kids, &mut i);
                self.open_paren(cond);
                if let Some(c) = cond {
                    self.emit_node(c);
                }
                self.emits(")");
                if let Some(s) = self.until_real(&kids, &mut i) {
                    self.emit_stmt(s);
                }
                while let Some(arm) = self.until_real(&kids, &mut i) {
                    self.emit_node(arm);
                }
            }
            ElseIf => {
                let kids = self.p.arena[id].body.clone();
                let mut i = 0;
                self.emits("else if");
                let cond = self.until_real(&kids, &mut i);
                self.open_paren(cond);
                if let Some(c) = cond {
                    self.emit_node(c);
                }
                self.emits(")");
                if let Some(s) = self.until_real(&kids, &mut i) {
                    self.emit_stmt(s);
                }
            }
            Else => {
                let kids = self.p.arena[id].body.clone();
                let mut i = 0;
                self.emits("else ");
                if let Some(s) = self.until_real(&kids, &mut i) {
                    self.emit_stmt(s);
                }
            }
            While => {
                let kids = self.p.arena[id].body.clone();
                let mut i = 0;
                self.emits("while");
                let cond = self.until_real(&kids, &mut i);
                self.open_paren(cond);
                if let Some(c) = cond {
                    self.emit_node(c);
                }
                self.emits(")");
                if let Some(s) = self.until_real(&kids, &mut i) {
                    self.emit_stmt(s);
                }
            }
            DoWhile => {
                let kids = self.p.arena[id].body.clone();
                let mut i = 0;
                self.emits("do ");
                if let Some(s) = self.until_real(&kids, &mut i) {
                    self.emit_stmt(s);
                }
                self.emits(" while");
                let cond = self.until_real(&kids, &mut i);
                self.open_paren(cond);
                if let Some(c) = cond {
                    self.emit_node(c);
                }
                self.emits(");");
            }
            For => self.emit_for(id),
            Switch => {
                let kids = self.p.arena[id].body.clone();
                let mut i = 0;
                self.emits("switch");
                let cond = self.until_real(&kids, &mut i);
                self.open_paren(cond);
                if let Some(c) = cond {
                    self.emit_node(c);
                }
                self.emits(")");
                if let Some(b) = self.until_real(&kids, &mut i) {
                    self.emit_stmt(b);
                }
            }
            Goto if generated => {
                let kids = self.p.arena[id].body.clone();
                let mut i = 0;
                self.emits("goto ");
                if let Some(n) = self.until_real(&kids, &mut i) {
                    self.emit_node(n);
                }
                self.emits(";");
            }
            Label if generated => {
                let kids = self.p.arena[id].body.clone();
                let mut i = 0;
                if let Some(n) = self.until_real(&kids, &mut i) {
                    self.emit_node(n);
                }
                self.emits(":");
            }
            kind => {
                if self.macro_depth > 0 {
                    self.scan_macro_bounds(id);
                } else {
                    self.print_verbatim(id);
                    // A bare type definition at file scope leaves its
                    // semicolon outside the item span.
                    if kind == Type && self.p.arena[id].parent.is_none() {
                        self.emits(";");
                    }
                }
            }
        }
    }

    fn emit_func(&mut self, id: ItemId) {
        let kids = self.p.arena[id].body.clone();
        let mut i = 0;
        if let Some(ty) = self.until_real(&kids, &mut i) {
            self.emit_node(ty);
        }
        if let Some(name) = self.until_real(&kids, &mut i) {
            self.emit_node(name);
        }
        let args = self.until_real(&kids, &mut i);
        self.open_paren(args);
        if let Some(args) = args {
            // The argument span ends at the closing paren, so the
            // verbatim print supplies `)` itself.
            self.emit_node(args);
        }
        match self.until_real(&kids, &mut i) {
            Some(block) => self.emit_node(block),
            None => self.emits(";"),
        }
    }

    fn emit_block(&mut self, id: ItemId) {
        self.emits("{");
        let kids = self.p.arena[id].body.clone();
        // A semicolon owed by an expression statement is held back while
        // the printer is muted inside a macro expansion and lands right
        // after the expansion ends.
        let mut pending_semi = false;
        for c in kids {
            if is_special(self.kind(c)) {
                self.emit_node(c);
            } else {
                self.emit_node(c);
                if self.kind(c) == ItemKind::Expr {
                    pending_semi = true;
                }
            }
            if pending_semi && self.macro_depth == 0 {
                self.emits(";");
                pending_semi = false;
            }
        }
        if pending_semi {
            self.emits(";");
        }
        self.sync_exit(id);
        if let Some(span) = self.p.arena[id].span() {
            if !span.is_empty() && (span.end as usize) < self.p.tokens.len() {
                self.flush_whitespace(span.end as usize);
            }
        }
        self.emits("}");
    }

    /// Clause bodies of a `for` header. Comma chains parse as sibling
    /// expressions with the separator token left in the gap, so the
    /// comma is re-added here.
    fn emit_body(&mut self, id: ItemId) {
        let kids = self.p.arena[id].body.clone();
        let mut i = 0;
        let mut first = true;
        while let Some(c) = self.until_real(&kids, &mut i) {
            if !first {
                self.emits(",");
            }
            first = false;
            self.emit_node(c);
        }
    }

    fn emit_for(&mut self, id: ItemId) {
        let kids = self.p.arena[id].body.clone();
        let mut i = 0;
        self.emits("for");
        let c1 = self.until_real(&kids, &mut i);
        self.open_paren(c1);
        if let Some(c1) = c1 {
            self.emit_node(c1);
            // A declaration clause carries its own semicolon.
            let declared = self
                .p
                .real_child(c1, 0)
                .map_or(false, |x| self.kind(x) == ItemKind::VarSet);
            if !declared {
                self.emits(";");
            }
        } else {
            self.emits(";");
        }
        if let Some(c2) = self.until_real(&kids, &mut i) {
            self.emit_node(c2);
        }
        self.emits(";");
        if let Some(c3) = self.until_real(&kids, &mut i) {
            self.emit_node(c3);
        }
        self.emits(")");
        if let Some(s) = self.until_real(&kids, &mut i) {
            self.emit_stmt(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use pretty_assertions::assert_eq;

    fn transpile(src: &str) -> String {
        let mut p = Parser::new(src);
        p.parse();
        assert!(!p.has_fatal(), "{:?}", p.errors);
        resolve(&mut p);
        emit_string(&p, "t.c")
    }

    /// Output with `#line` directives removed, for comparisons against
    /// the input text.
    fn stripped(src: &str) -> String {
        let mut out: String = transpile(src)
            .lines()
            .filter(|l| !l.starts_with("#line "))
            .collect::<Vec<_>>()
            .join("\n");
        out.push('\n');
        out
    }

    #[test]
    fn round_trip_without_defer_is_identical() {
        let src = "int main() {\n\treturn 0;\n}\n";
        assert_eq!(stripped(src), src);
    }

    #[test]
    fn output_starts_with_a_line_directive() {
        let out = transpile("int x;\n");
        assert!(out.starts_with("#line 1 \"t.c\"\n"), "{}", out);
    }

    #[test]
    fn defer_body_runs_before_the_return() {
        let src = "int main() {\n\tdefer f();\n\treturn 0;\n}\n";
        assert_eq!(stripped(src), "int main() {\n\t f();\n\treturn 0;\n}\n");
    }

    #[test]
    fn conditional_branches_reappear_in_place() {
        let src = "#ifdef A\nint x;\n#else\nint y;\n#endif\n";
        assert_eq!(stripped(src), src);
    }

    #[test]
    fn blank_runs_collapse_into_a_line_directive() {
        let out = transpile("int a;\n\n\n\nint b;\n");
        assert_eq!(
            out,
            "#line 1 \"t.c\"\nint a;\n#line 5 \"t.c\"\nint b;\n"
        );
    }

    #[test]
    fn comments_between_items_survive() {
        let src = "int a; /* keep */ int b;\n";
        assert_eq!(stripped(src), src);
    }

    #[test]
    fn line_comment_on_a_dropped_defer_survives() {
        let src = "void f() {\n\tdefer g(); // cleanup\n\treturn;\n}\n";
        let out = stripped(src);
        assert!(out.contains("// cleanup"), "{}", out);
        assert!(!out.contains("defer"), "{}", out);
    }

    #[test]
    fn statement_macro_keeps_its_semicolon() {
        let src = "#define CLEAN() free(p)\nvoid g() {\n\tCLEAN();\n}\n";
        assert_eq!(stripped(src), src);
    }

    #[test]
    fn expression_macro_prints_as_invoked() {
        let src = "#define TEN 10\nint main() {\n\treturn TEN;\n}\n";
        assert_eq!(stripped(src), src);
    }

    #[test]
    fn partial_exits_jump_to_generated_labels() {
        let src = "int f(int c) {\n\tdefer a();\n\tif (c) return 0;\n\tdefer b();\n\treturn 0;\n}\n";
        let out = transpile(src);
        assert!(out.contains("#line 0 \"(generated)\""), "{}", out);
        assert!(out.contains("goto defer0;"), "{}", out);
        assert!(out.contains("defer0:"), "{}", out);
        let b = out.find("b()").unwrap();
        let a = out.rfind("a()").unwrap();
        assert!(b < a, "cleanup must run in reverse order:\n{}", out);
    }

    #[test]
    fn prototypes_and_bare_types_keep_semicolons() {
        let src = "struct point { int x, y; };\nint add(int a, int b);\n";
        assert_eq!(stripped(src), src);
    }

    #[test]
    fn include_and_blank_line_round_trip() {
        let src = "#include <stdio.h>\n\nint main() {\n\treturn 0;\n}\n";
        assert_eq!(stripped(src), src);
    }

    #[test]
    fn for_loop_round_trips() {
        let src = "void f() {\n\tfor (int i = 0; i < 10; i++) g(i);\n}\n";
        assert_eq!(stripped(src), src);
    }
}
