//! dotrest — an interpreter for a line-oriented HTTP scripting DSL.
//!
//! Script files mix requests, inline assertions, variable bindings,
//! configuration, includes and embedded code blocks:
//!
//! ```text
//! config baseUri = http://localhost:8888
//! token = {env API_TOKEN}
//!
//! GET /users/42
//! Authorization: Bearer {{token}}
//!
//! assert status === 200
//! assert jsonpath $.name == "John Doe"
//! ```
//!
//! [`DotRest`] runs a file end to end; the `parsing`, `execution` and
//! `http` modules expose the pieces individually.

pub mod app;
pub mod cli;
pub mod config;
pub mod errors;
pub mod execution;
pub mod http;
pub mod output;
pub mod parsing;
pub mod reading;
pub mod scripting;

pub use app::DotRest;
pub use errors::Error;
