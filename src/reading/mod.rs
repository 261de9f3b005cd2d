//! Line-oriented script reading
//!
//! A script file is consumed as a sequence of numbered [`Line`]s through a
//! [`LineReader`], which supports exactly one line of pushback for parser
//! lookahead.

mod line;
mod reader;

pub use line::Line;
pub use reader::LineReader;
