//! Type definitions

pub mod guest;
pub mod import;
pub mod messages;

pub use guest::*;
pub use import::*;
pub use messages::*;
