mod errors;
mod message;

pub use errors::*;
pub use message::*;
