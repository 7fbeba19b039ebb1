//! In-memory publication store for tests and local runs without Postgres

use std::collections::BTreeMap;

use async_trait::async_trait;
use campuspress_common::db::Page;
use campuspress_common::publication::PublicationDraft;
use campuspress_common::Result;
use tokio::sync::RwLock;

use super::{normalize_domain, Publication, PublicationStore, Published};

#[derive(Default)]
struct State {
    publications: BTreeMap<i64, Publication>,
    by_source: BTreeMap<i64, i64>,
    last_id: i64,
}

#[derive(Default)]
pub struct InMemoryPublicationStore {
    state: RwLock<State>,
}

impl InMemoryPublicationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PublicationStore for InMemoryPublicationStore {
    async fn publish(&self, draft: PublicationDraft) -> Result<Published> {
        let mut state = self.state.write().await;

        if let Some(id) = state.by_source.get(&draft.source_submission_id).copied() {
            if let Some(existing) = state.publications.get(&id) {
                return Ok(Published {
                    publication: existing.clone(),
                    created: false,
                });
            }
        }

        state.last_id += 1;
        let publication = Publication {
            id: state.last_id,
            source_submission_id: draft.source_submission_id,
            title: draft.title,
            abstract_text: draft.abstract_text,
            authors: draft.authors,
            keywords: draft.keywords,
            research_domain: draft.research_domain,
            file_key: draft.file_key,
            author_id: draft.author_id,
            author_email: draft.author_email,
            approved_by: draft.approved_by,
            published_at: chrono::Utc::now(),
        };

        state
            .by_source
            .insert(publication.source_submission_id, publication.id);
        state.publications.insert(publication.id, publication.clone());

        Ok(Published {
            publication,
            created: true,
        })
    }

    async fn find(&self, id: i64) -> Result<Option<Publication>> {
        Ok(self.state.read().await.publications.get(&id).cloned())
    }

    async fn list(&self, domain: Option<&str>, page: u64, size: u64) -> Result<Page<Publication>> {
        let wanted = domain.map(normalize_domain);
        let state = self.state.read().await;
        let matching: Vec<Publication> = state
            .publications
            .values()
            .rev()
            .filter(|p| {
                wanted
                    .as_deref()
                    .map_or(true, |d| normalize_domain(&p.research_domain) == d)
            })
            .cloned()
            .collect();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.saturating_mul(size) as usize)
            .take(size as usize)
            .collect();
        Ok(Page::new(items, page, size, total))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::draft;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_publish_is_idempotent_per_submission() {
        let store = InMemoryPublicationStore::new();

        let first = assert_ok!(store.publish(draft(7, "Biology")).await);
        assert!(first.created);
        assert_eq!(first.publication.id, 1);

        let mut retry = draft(7, "Biology");
        retry.title = "A different title on retry".to_string();
        let second = assert_ok!(store.publish(retry).await);
        assert!(!second.created);
        assert_eq!(second.publication.id, 1);
        assert_eq!(second.publication.title, first.publication.title);

        let other = store.publish(draft(8, "Biology")).await.unwrap();
        assert!(other.created);
        assert_eq!(other.publication.id, 2);

        let found = assert_ok!(store.find(1).await).unwrap();
        assert_eq!(found.source_submission_id, 7);
        assert_eq!(assert_ok!(store.find(99).await), None);
    }

    #[tokio::test]
    async fn test_list_filters_domain_newest_first() {
        let store = InMemoryPublicationStore::new();
        for (source, domain) in [(1, "Biology"), (2, "Physics"), (3, "biology ")] {
            store.publish(draft(source, domain)).await.unwrap();
        }

        let page = assert_ok!(store.list(Some("BIOLOGY"), 0, 10).await);
        assert_eq!(page.total, 2);
        let sources: Vec<i64> = page.items.iter().map(|p| p.source_submission_id).collect();
        assert_eq!(sources, vec![3, 1]);

        let page = store.list(None, 1, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].source_submission_id, 1);
    }
}
