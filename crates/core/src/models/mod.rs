//! Data models for Tradeyard

mod message;
mod room;
mod watermark;

pub use message::*;
pub use room::*;
pub use watermark::*;
