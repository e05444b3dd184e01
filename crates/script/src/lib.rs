//! Tree-walking interpreter for Flamingo, the scripting language used in
//! `build.fl` files.

pub mod ast;
pub mod env;
pub mod host;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod value;

pub use host::{HostClass, HostClassId, HostError, HostRegistry};
pub use interp::{ImportResolver, Interpreter};
pub use value::{Value, ValueRef};
