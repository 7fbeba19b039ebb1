//! SeaORM entity models owned by the content service

pub mod publication;

pub use publication::{
    ActiveModel as PublicationActiveModel, Column as PublicationColumn,
    Entity as PublicationEntity, Model as PublicationRow,
};
