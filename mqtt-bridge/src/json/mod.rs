//! Streaming JSON engine (spec.md §4.5): [`pointer`] tokenizes RFC 6901
//! pointers, [`trie`] compiles them into a navigable arena, and [`parser`]
//! drives a SAX-style walk of a document against that arena.

pub mod parser;
pub mod pointer;
pub mod trie;

pub use parser::{parse, JsonError};
pub use trie::PointerTrie;
