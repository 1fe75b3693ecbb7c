//! Lexing and parsing of C extended with `defer`.
//!
//! The pipeline is span-preserving: tokens record byte ranges into
//! their buffer of origin and items are spans of tokens, so the
//! printer can reproduce untouched code byte for byte, comments and
//! all. See [`item`] for the tree the grammar produces.

pub mod checkpoint;
mod grammar;
pub mod item;
mod lexer;
#[allow(clippy::module_inception)]
mod parser;
mod preprocess;
pub mod token;

pub use item::{is_special, Item, ItemId, ItemKind, ItemSource};
pub use parser::{ParseError, Parser};
pub use preprocess::{Branch, CondGroup, MacroDef};
pub use token::{BufferId, ByteSpan, Span, Token, TokenKind};
