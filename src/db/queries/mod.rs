//! Database queries

pub mod guest;
pub mod role;
