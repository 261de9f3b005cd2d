//! Embedded-code capability
//!
//! Code blocks (`<% ... %>`) are handed to an injected [`ScriptEngine`]
//! rather than evaluated in-process. The engine gets read/write access to
//! context variables and may register deferred cleanup snippets, which the
//! run flushes exactly once at the end.
//!
//! An optional Lua 5.4 implementation ships behind the `lua` Cargo feature:
//! ```text
//! cargo build --features lua
//! ```
//!
//! # Lua API
//!
//! | Lua function        | Effect                                    |
//! |---------------------|-------------------------------------------|
//! | `var(name)`         | Read a context variable → string or nil   |
//! | `var(name, value)`  | Write a context variable                  |
//! | `unset(name)`       | Remove a context variable                 |
//! | `defer(snippet)`    | Run `snippet` when the run completes      |

use crate::execution::Context;

pub trait ScriptEngine {
    /// Execute one code block against the live context. Errors are plain
    /// strings; the code runner wraps them with the offending source line.
    fn execute(&self, code: &str, ctx: &mut Context) -> Result<(), String>;
}

#[cfg(feature = "lua")]
pub use lua_impl::LuaEngine;

#[cfg(feature = "lua")]
mod lua_impl {
    use std::cell::RefCell;

    use mlua::prelude::*;

    use crate::execution::{Context, Val};

    use super::ScriptEngine;

    /// Lua 5.4 interpreter with the context API pre-registered per call.
    pub struct LuaEngine {
        lua: Lua,
    }

    impl LuaEngine {
        pub fn new() -> Self {
            Self { lua: Lua::new() }
        }
    }

    impl Default for LuaEngine {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ScriptEngine for LuaEngine {
        fn execute(&self, code: &str, ctx: &mut Context) -> Result<(), String> {
            let cell = RefCell::new(ctx);

            self.lua
                .scope(|scope| {
                    let globals = self.lua.globals();

                    let var = scope.create_function_mut(
                        |_, (name, value): (String, Option<String>)| {
                            let mut ctx = cell.borrow_mut();
                            match value {
                                Some(v) => {
                                    ctx.set_var(&name, Val::Str(v.clone()));
                                    Ok(Some(v))
                                }
                                None => Ok(ctx.var(&name).ok().map(|v| v.stringify())),
                            }
                        },
                    )?;
                    globals.set("var", var)?;

                    let unset = scope.create_function_mut(|_, name: String| {
                        cell.borrow_mut().unset(&name);
                        Ok(())
                    })?;
                    globals.set("unset", unset)?;

                    let defer = scope.create_function_mut(|_, snippet: String| {
                        cell.borrow_mut().defer_script(snippet);
                        Ok(())
                    })?;
                    globals.set("defer", defer)?;

                    self.lua.load(code).exec()
                })
                .map_err(|e| e.to_string())
        }
    }
}
