//! undefer lowers C extended with a `defer` statement to plain C.
//!
//! The pipeline keeps the input text authoritative end to end: the
//! [`parser`] builds a span-tagged item tree over the original bytes,
//! [`resolve`] rewrites `defer` statements into cleanup code at every
//! scope exit, and [`emit`] prints the tree back out, reproducing
//! untouched code verbatim and marking moved or synthesized code with
//! `#line` directives.
//!
//! ```no_run
//! use undefer::{emit::emit_string, parser::Parser, resolve::resolve};
//!
//! let mut p = Parser::new("int f() { defer g(); return 1; }");
//! p.parse();
//! resolve(&mut p);
//! let c = emit_string(&p, "f.c");
//! ```

pub mod emit;
pub mod parser;
pub mod resolve;
