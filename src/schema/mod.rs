//! SpiceDB schema tooling: structural parsing and syntax highlighting.
//!
//! Both operate on raw schema text and never fail.

pub mod highlight;
pub mod lexer;
pub mod parser;

pub use highlight::highlight;
pub use parser::{parse_schema, render_tree, NamespaceInfo, PermissionDecl, RelationDecl};
