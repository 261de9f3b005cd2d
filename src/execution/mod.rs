//! Directive execution: values, context, runners
//!
//! The resolver ([`Value`] / [`Val`]) turns expression text into runtime
//! values, the [`Context`] holds all per-run state, and the [`Runner`]
//! enum executes parsed directives against it.

mod assert;
mod context;
mod request;
mod runner;
mod val;
mod value;

pub use assert::{is_operator, AssertRunner, OPERATORS};
pub use context::{Context, FUNCTIONS};
pub use request::{BodySpec, MultipartSpec, RequestRunner};
pub use runner::{
    CodeRunner, CommentRunner, ConfigRunner, DurationRunner, EchoRunner, IncludeRunner, Runner,
    VariableRunner,
};
pub use val::{Key, Val};
pub use value::{
    file_embed_path, replace_placeholders, split_unescaped_commas, unescape_commas, Value,
};
