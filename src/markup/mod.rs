//! Lightweight markup processing.
//!
//! [`scan`] tokenizes tags straight off a byte buffer, keeping their byte
//! spans so callers can splice rewritten tags back into the original text
//! or address it by offset. [`tree`] builds a small element tree for the
//! places that need structure rather than spans.

pub mod scan;
pub mod tree;

pub use scan::{Attr, Tag, TagScanner, render_tag, rewrite_tags};
pub use tree::{Node, NodeData, NodeId, Tree};
