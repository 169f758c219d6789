//! Grader Script
//!
//! The small indentation-structured language that test stores and student
//! modules are written in. Snippets are dedented, tokenized, parsed into an
//! AST and evaluated by a tree-walking [`Interpreter`] against a mutable
//! [`Environment`].
//!
//! # Core Concepts
//!
//! - [`Value`]: runtime values with value equality across numeric types
//! - [`Environment`]: name to value bindings, cloned for private working copies
//! - [`Interrupt`]: cooperative cancellation checked at loops and calls
//! - [`ModuleLoader`]: resolves `from <module> import ...`
//!
//! # Example
//!
//! ```rust
//! use grader_script::{Environment, Interpreter, Value};
//!
//! let mut env = Environment::new();
//! let interp = Interpreter::new();
//! interp.run("def square(x):\n    return x * x", &mut env).unwrap();
//! assert_eq!(interp.run("square(4)", &mut env).unwrap(), Some(Value::Int(16)));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod ast;
mod builtins;
mod env;
mod error;
mod interp;
mod interrupt;
mod lexer;
mod loader;
mod ops;
mod output;
mod parser;
mod source;
mod value;

pub use builtins::Builtin;
pub use env::Environment;
pub use error::{FaultKind, ScriptError, ScriptResult};
pub use interp::{Interpreter, DEFAULT_MAX_DEPTH};
pub use interrupt::Interrupt;
pub use loader::{FsLoader, MemoryLoader, ModuleLoader, NoModules};
pub use output::{Output, Transcript};
pub use parser::{parse_expression, parse_program};
pub use source::{dedent, dedent_block};
pub use value::{Function, ModuleHome, Seq, SharedFrame, Value};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
