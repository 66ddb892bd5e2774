//! Rule DSL: options, compiled nodes, the compiler and path selection

mod compiler;
mod node;
mod options;
mod path;
mod scanner;

pub use compiler::{compile, Compilation, Diagnostic, DiagnosticKind};
pub use node::{Field, RuleNode, RuleNodeBuilder};
pub use options::{
    is_executable, OptionSet, OptionValue, ATTR, IMG_RATIO, INDEX, LIMIT, TRANSFORM, VALUE,
};
pub use path::{request_path, select_rules, PathScope, CATCH_ALL};
