//! Publication entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "publications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(unique)]
    pub source_submission_id: i64,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub abstract_text: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub authors: Json,

    #[sea_orm(column_type = "JsonBinary")]
    pub keywords: Json,

    #[sea_orm(column_type = "Text")]
    pub research_domain: String,

    #[sea_orm(column_type = "Text")]
    pub file_key: String,

    #[sea_orm(column_type = "Text")]
    pub author_id: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub author_email: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub approved_by: String,

    pub published_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
