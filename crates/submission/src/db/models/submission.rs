//! Submission entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text")]
    pub owner_id: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub owner_email: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub abstract_text: String,

    /// JSON array of author names
    #[sea_orm(column_type = "JsonBinary")]
    pub authors: Json,

    /// JSON array of keywords
    #[sea_orm(column_type = "JsonBinary")]
    pub keywords: Json,

    #[sea_orm(column_type = "Text")]
    pub research_domain: String,

    #[sea_orm(column_type = "Text")]
    pub file_key: String,

    #[sea_orm(column_type = "Text")]
    pub file_name: String,

    #[sea_orm(column_type = "Text")]
    pub file_content_type: String,

    pub file_size: i64,

    #[sea_orm(column_type = "Text")]
    pub file_sha256: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub reviewer_email: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub review_comment: Option<String>,

    pub reviewed_at: Option<DateTimeWithTimeZone>,

    pub publication_id: Option<i64>,

    pub version: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::moderation_event::Entity")]
    ModerationEvents,
}

impl Related<super::moderation_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModerationEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
