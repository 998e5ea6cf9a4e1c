//! ToolRegistry & Dispatcher (C3): name -> handler map, arg validation,
//! result envelope, and custom-tool discovery. Individual tool
//! implementations are leaves; this module only wires them together.

pub mod builtin;
mod context;
mod error;
mod executor;
mod traits;

pub use context::ToolContext;
pub use error::ToolError;
pub use executor::{ToolExecutor, ToolProfile};
pub use traits::{Tool, ToolResult};
