//! API handlers module

pub mod admin;
pub mod health;
pub mod permissions;
pub mod submissions;

use serde::Deserialize;

/// Body of a moderation decision
#[derive(Debug, Default, Deserialize)]
pub struct ModerationRequest {
    #[serde(default)]
    pub comment: Option<String>,
}
