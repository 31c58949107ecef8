pub mod boundary;
pub mod splitter;
mod state;
pub use state::ParserState;

mod config;
pub use config::*;
mod delta;
pub use delta::*;

// Protocol implementations behind one trait
pub mod formats;
pub use formats::{ParserFactory, ToolCallProtocol};

pub mod interceptor;
pub use interceptor::{ToolCallInterceptor, intercept_tool_calls};
mod system_message;
pub use system_message::*;
