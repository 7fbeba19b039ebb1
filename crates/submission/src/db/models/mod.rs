//! SeaORM entity models owned by the submission service

pub mod moderation_event;
pub mod submission;

pub use moderation_event::{
    ActiveModel as ModerationEventActiveModel, Column as ModerationEventColumn,
    Entity as ModerationEventEntity, Model as ModerationEventRow,
};
pub use submission::{
    ActiveModel as SubmissionActiveModel, Column as SubmissionColumn, Entity as SubmissionEntity,
    Model as SubmissionRow,
};
