//! The parsed item tree.
//!
//! Items are not a classical AST: each one is primarily a *span* of
//! tokens plus a kind tag and an ordered list of children. The printer
//! reproduces most constructs verbatim from their spans, so items only
//! need enough structure for the resolver to find scopes, defers and
//! exits, and for the printer to re-enter the handful of constructs it
//! rewrites.
//!
//! Items live in an append-only arena owned by the parser and refer to
//! each other by index, which makes speculative parsing cheap: rolling
//! back is a truncation.

use crate::parser::token::Span;
use crate::parser::Parser;

/// Index into the parser's item arena.
pub type ItemId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Expr,
    Op,
    Ternary,
    Assignment,
    Cast,
    Dot,
    Access,
    Array,
    LitNum,
    LitStr,
    LitChar,
    Initializer,
    InitField,
    InitIndex,
    Name,
    /// Declarator: pointer/const modifiers, optional name, array and
    /// function-pointer suffixes.
    Declarator,
    TypeMod,
    FnPtr,
    FnCall,
    Type,
    Typedef,
    Enum,
    EnumVal,
    Struct,
    Union,
    Field,
    Body,
    Arg,
    Args,
    Func,
    Var,
    VarSet,
    Block,
    If,
    ElseIf,
    Else,
    While,
    DoWhile,
    For,
    Switch,
    Case,
    Defer,
    Ret,
    Break,
    Goto,
    Label,
    Include,
    Define,
    Dir,
    IfDir,
    IfDef,
    ElifDir,
    ElseDir,
    MacroCall,
    MacroArg,
    MacroEof,
}

/// Where an item's text comes from: a span of scanned tokens, or text
/// synthesized by the resolver (labels, gotos).
#[derive(Debug, Clone)]
pub enum ItemSource {
    Tokens(Span),
    Generated(Option<String>),
}

#[derive(Debug, Clone)]
pub struct Item {
    pub kind: ItemKind,
    pub source: ItemSource,
    pub body: Vec<ItemId>,
    pub parent: Option<ItemId>,
    /// Conditional-compilation group this item was parsed under, if any.
    pub group: Option<u32>,
    /// Branch index within that group.
    pub branch: u32,
}

impl Item {
    pub fn is_generated(&self) -> bool {
        matches!(self.source, ItemSource::Generated(_))
    }

    pub fn span(&self) -> Option<Span> {
        match self.source {
            ItemSource::Tokens(span) => Some(span),
            ItemSource::Generated(_) => None,
        }
    }
}

/// Items the printer emits transparently while looking for the next
/// "real" item: preprocessor machinery and macro bookkeeping.
pub fn is_special(kind: ItemKind) -> bool {
    matches!(
        kind,
        ItemKind::Dir
            | ItemKind::IfDir
            | ItemKind::IfDef
            | ItemKind::ElifDir
            | ItemKind::ElseDir
            | ItemKind::Include
            | ItemKind::Define
            | ItemKind::MacroCall
            | ItemKind::MacroEof
    )
}

impl Parser {
    /// Source text of an item. Spans whose endpoints sit in the same
    /// buffer are sliced directly; spans that cross an expansion
    /// boundary fall back to joining the individual token texts.
    pub fn item_text(&self, id: ItemId) -> String {
        match &self.arena[id].source {
            ItemSource::Generated(Some(text)) => text.clone(),
            ItemSource::Generated(None) => String::new(),
            ItemSource::Tokens(span) => {
                if span.is_empty() {
                    return String::new();
                }
                let (start, end) = (span.start as usize, span.end as usize);
                if end >= self.tokens.len() {
                    return String::new();
                }
                let (st, en) = (self.tokens[start], self.tokens[end]);
                if st.buf == en.buf {
                    let text = self.buffer_text(st.buf);
                    let from = (st.span.start as usize).min(text.len());
                    let to = (en.span.end() as usize).min(text.len());
                    if from <= to {
                        return text[from..to].to_string();
                    }
                    String::new()
                } else {
                    let parts: Vec<&str> = (start..=end)
                        .map(|i| self.token_text(&self.tokens[i]))
                        .collect();
                    parts.join(" ")
                }
            }
        }
    }

    /// First child that is not preprocessor bookkeeping.
    pub fn real_child(&self, id: ItemId, n: usize) -> Option<ItemId> {
        self.arena[id]
            .body
            .iter()
            .copied()
            .filter(|&c| !is_special(self.arena[c].kind))
            .nth(n)
    }

    /// Structural equality: same kind, same shape, and equal text at
    /// name and literal leaves. Used to decide whether several exits
    /// from a scope can share one lowered tail.
    pub fn item_eq(&self, a: ItemId, b: ItemId) -> bool {
        let (ia, ib) = (&self.arena[a], &self.arena[b]);
        if ia.kind != ib.kind || ia.body.len() != ib.body.len() {
            return false;
        }
        if ia.body.is_empty() {
            return match ia.kind {
                ItemKind::Name | ItemKind::LitStr | ItemKind::LitChar | ItemKind::LitNum => {
                    self.item_text(a) == self.item_text(b)
                }
                _ => true,
            };
        }
        ia.body
            .iter()
            .zip(ib.body.iter())
            .all(|(&ca, &cb)| self.item_eq(ca, cb))
    }

    /// Whether `x` sits somewhere below `anc` in the tree.
    pub fn is_descendant(&self, anc: ItemId, mut x: ItemId) -> bool {
        while let Some(p) = self.arena[x].parent {
            if p == anc {
                return true;
            }
            x = p;
        }
        false
    }

    /// Append a generated item, inheriting conditional tags from
    /// `inherit` so it emits inside the same branch.
    pub fn gen_item(
        &mut self,
        kind: ItemKind,
        parent: Option<ItemId>,
        inherit: Option<ItemId>,
        text: Option<String>,
    ) -> ItemId {
        let (group, branch) = match inherit {
            Some(i) => (self.arena[i].group, self.arena[i].branch),
            None => (None, 0),
        };
        let id = self.arena.len();
        self.arena.push(Item {
            kind,
            source: ItemSource::Generated(text),
            body: Vec::new(),
            parent,
            group,
            branch,
        });
        id
    }

    /// Deep copy of an item subtree. The resolver duplicates cleanup
    /// code at each independent exit; copying keeps every item singly
    /// owned so parent links stay accurate.
    pub fn clone_subtree(&mut self, id: ItemId, parent: Option<ItemId>) -> ItemId {
        let template = self.arena[id].clone();
        let new_id = self.arena.len();
        self.arena.push(Item {
            kind: template.kind,
            source: template.source,
            body: Vec::new(),
            parent,
            group: template.group,
            branch: template.branch,
        });
        let body: Vec<ItemId> = template
            .body
            .iter()
            .map(|&c| self.clone_subtree(c, Some(new_id)))
            .collect();
        self.arena[new_id].body = body;
        new_id
    }

    /// Debug dump of the item tree rooted at the top-level items.
    pub fn dump_tree(&self) -> String {
        let mut out = String::new();
        for &root in &self.items {
            self.dump_item(root, 0, &mut out);
        }
        out
    }

    fn dump_item(&self, id: ItemId, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        let item = &self.arena[id];
        out.push_str(&format!("{:?}", item.kind));
        if item.body.is_empty() {
            let text = self.item_text(id);
            if !text.is_empty() {
                out.push_str(&format!(" `{}`", text));
            }
        }
        out.push('\n');
        for &child in &item.body {
            self.dump_item(child, depth + 1, out);
        }
    }
}
