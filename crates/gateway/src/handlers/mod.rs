//! API handlers module

pub mod health;
