//! API handlers module

pub mod health;
pub mod internal;
pub mod publications;
