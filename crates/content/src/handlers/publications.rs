//! Public reading API

use axum::{
    extract::{Path, Query, State},
    Json,
};
use campuspress_common::{
    db::{Page, PageQuery},
    errors::{AppError, Result},
};
use serde::Deserialize;

use crate::db::Publication;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
}

pub async fn get_publication(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Publication>> {
    let publication = state
        .store
        .find(id)
        .await?
        .ok_or_else(|| AppError::PublicationNotFound { id: id.to_string() })?;
    Ok(Json(publication))
}

/// Newest publications first, optionally within one research domain
pub async fn list_publications(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Publication>>> {
    let limits = &state.config.submission;
    let (page, size) = PageQuery {
        page: query.page,
        size: query.size,
    }
    .resolve(limits.page_size, limits.max_page_size);

    let domain = query.domain.as_deref().filter(|d| !d.trim().is_empty());
    Ok(Json(state.store.list(domain, page, size).await?))
}
