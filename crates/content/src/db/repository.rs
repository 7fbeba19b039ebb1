//! Postgres-backed publication store
//!
//! `source_submission_id` is unique, so a concurrent duplicate insert loses
//! the race at the database and is answered with the winner's row.

use async_trait::async_trait;
use campuspress_common::db::{DbPool, Page};
use campuspress_common::publication::PublicationDraft;
use campuspress_common::{AppError, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use tracing::{debug, instrument, warn};

use super::models::*;
use super::{normalize_domain, Publication, PublicationStore, Published};

#[derive(Clone)]
pub struct PublicationRepository {
    pool: DbPool,
}

impl PublicationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    async fn find_by_source(&self, source_submission_id: i64) -> Result<Option<Publication>> {
        PublicationEntity::find()
            .filter(PublicationColumn::SourceSubmissionId.eq(source_submission_id))
            // Primary, so a just-committed row is always visible
            .one(self.write_conn())
            .await?
            .map(Publication::try_from)
            .transpose()
    }
}

fn string_list(value: serde_json::Value) -> Result<Vec<String>> {
    serde_json::from_value(value).map_err(|e| AppError::Internal {
        message: format!("Corrupt string list in database: {}", e),
    })
}

impl TryFrom<PublicationRow> for Publication {
    type Error = AppError;

    fn try_from(row: PublicationRow) -> Result<Self> {
        Ok(Publication {
            id: row.id,
            source_submission_id: row.source_submission_id,
            title: row.title,
            abstract_text: row.abstract_text,
            authors: string_list(row.authors)?,
            keywords: string_list(row.keywords)?,
            research_domain: row.research_domain,
            file_key: row.file_key,
            author_id: row.author_id,
            author_email: row.author_email,
            approved_by: row.approved_by,
            published_at: row.published_at.into(),
        })
    }
}

#[async_trait]
impl PublicationStore for PublicationRepository {
    #[instrument(skip(self, draft), fields(source_submission_id = draft.source_submission_id))]
    async fn publish(&self, draft: PublicationDraft) -> Result<Published> {
        let source_submission_id = draft.source_submission_id;

        if let Some(existing) = self.find_by_source(source_submission_id).await? {
            return Ok(Published {
                publication: existing,
                created: false,
            });
        }

        let row = PublicationActiveModel {
            source_submission_id: Set(source_submission_id),
            title: Set(draft.title),
            abstract_text: Set(draft.abstract_text),
            authors: Set(serde_json::to_value(draft.authors)?),
            keywords: Set(serde_json::to_value(draft.keywords)?),
            research_domain: Set(draft.research_domain),
            file_key: Set(draft.file_key),
            author_id: Set(draft.author_id),
            author_email: Set(draft.author_email),
            approved_by: Set(draft.approved_by),
            published_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        match row.insert(self.write_conn()).await {
            Ok(row) => {
                debug!(publication_id = row.id, "Publication row inserted");
                Ok(Published {
                    publication: row.try_into()?,
                    created: true,
                })
            }
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                warn!("Concurrent publish for the same submission, returning existing row");
                let existing = self.find_by_source(source_submission_id).await?.ok_or_else(|| {
                    AppError::Internal {
                        message: format!(
                            "publication for submission {} vanished after unique violation",
                            source_submission_id
                        ),
                    }
                })?;
                Ok(Published {
                    publication: existing,
                    created: false,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find(&self, id: i64) -> Result<Option<Publication>> {
        PublicationEntity::find_by_id(id)
            .one(self.read_conn())
            .await?
            .map(Publication::try_from)
            .transpose()
    }

    async fn list(&self, domain: Option<&str>, page: u64, size: u64) -> Result<Page<Publication>> {
        let mut query = PublicationEntity::find();
        if let Some(domain) = domain {
            query = query.filter(Expr::cust_with_values(
                "LOWER(TRIM(research_domain)) = $1",
                [normalize_domain(domain)],
            ));
        }

        let paginator = query
            .order_by_desc(PublicationColumn::PublishedAt)
            .order_by_desc(PublicationColumn::Id)
            .paginate(self.read_conn(), size);

        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page)
            .await?
            .into_iter()
            .map(Publication::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, page, size, total))
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
