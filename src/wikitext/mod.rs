//! Wikitext parsing, template expansion and text cleaning.

pub mod clean;
pub mod expand;
pub mod node;
pub mod parser;

pub use clean::{clean_node, CategorySink};
pub use node::{Node, NodeKind, ParamKey, WikiNode};
pub use parser::parse;
