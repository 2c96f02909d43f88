// rangeopt — Range-guided optimizer for SSA intermediate code
//
// Library root. Front end (lexer, parser, resolve), analysis (interval,
// bounds, alias, range) and rewriting passes (cfg_simplify, const_subst,
// align), orchestrated by `pipeline`.

pub mod alias;
pub mod align;
pub mod ast;
pub mod bounds;
pub mod cfg_simplify;
pub mod config;
pub mod const_subst;
pub mod diag;
pub mod id;
pub mod interval;
pub mod ir;
pub mod layout;
pub mod lexer;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod range;
pub mod reinterpret;
pub mod resolve;
