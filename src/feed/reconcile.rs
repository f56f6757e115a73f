use chrono::DateTime;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::fetcher::{FetchError, Fetcher};
use super::parser::{parse_document, ParseError, SyndicationDocument, SyndicationItem};
use crate::storage::{Database, DatabaseError, NewPost, Source};

/// `pubDate` layout: RFC 1123 with a numeric zone, e.g.
/// `Mon, 02 Jan 2006 15:04:05 -0700`.
pub const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Errors that end reconciliation of a document early.
///
/// Items before the failing one stay persisted; later items are not tried.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Item {index} has an unparsable pubDate {value:?}: {source}")]
    DateParse {
        index: usize,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Failed to store item {index}: {source}")]
    Persistence {
        index: usize,
        #[source]
        source: DatabaseError,
    },
}

/// Everything that can go wrong ingesting one source in one tick.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// Converts a `pubDate` string into epoch seconds (UTC).
pub fn parse_pub_date(value: &str) -> Result<i64, chrono::ParseError> {
    DateTime::parse_from_str(value.trim(), PUB_DATE_FORMAT).map(|dt| dt.timestamp())
}

/// Stable dedupe key for an item: its link, else its guid, else a SHA-256
/// over title, description and pubDate.
pub fn natural_key(item: &SyndicationItem) -> String {
    let link = item.link.trim();
    if !link.is_empty() {
        return link.to_string();
    }
    if let Some(guid) = item.guid.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        return guid.to_string();
    }

    let input = format!("{}|{}|{}", item.title, item.description, item.pub_date);
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}

/// Stores each item of `doc` as a post of `source_id`, in document order.
///
/// Items already stored for this source (same natural key) are skipped
/// silently. Returns the number of posts actually inserted.
pub async fn reconcile(
    db: &Database,
    source_id: i64,
    doc: &SyndicationDocument,
) -> Result<usize, ReconcileError> {
    let mut inserted = 0;

    for (index, item) in doc.items.iter().enumerate() {
        let published_at =
            parse_pub_date(&item.pub_date).map_err(|source| ReconcileError::DateParse {
                index,
                value: item.pub_date.clone(),
                source,
            })?;

        let post = NewPost {
            source_id,
            title: item.title.clone(),
            description: item.description.clone(),
            url: item.link.clone(),
            natural_key: natural_key(item),
            published_at,
        };

        match db.insert_post(&post).await {
            Ok(_) => inserted += 1,
            Err(DatabaseError::UniqueViolation(_)) => {
                tracing::debug!(
                    source_id = source_id,
                    key = %post.natural_key,
                    "Post already stored, skipping"
                );
            }
            Err(source) => return Err(ReconcileError::Persistence { index, source }),
        }
    }

    Ok(inserted)
}

/// One source's share of a tick: fetch, parse, reconcile.
pub async fn ingest(
    db: &Database,
    fetcher: &Fetcher,
    source: &Source,
) -> Result<usize, IngestError> {
    let bytes = fetcher.fetch(&source.url).await?;
    let doc = parse_document(&bytes)?;
    tracing::debug!(
        source_id = source.id,
        channel = %doc.title,
        items = doc.items.len(),
        "Parsed feed document"
    );
    Ok(reconcile(db, source.id, &doc).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(title: &str, link: &str, pub_date: &str) -> SyndicationItem {
        SyndicationItem {
            title: title.to_string(),
            link: link.to_string(),
            description: format!("About {}", title),
            pub_date: pub_date.to_string(),
            guid: None,
        }
    }

    async fn test_db_with_source() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("owner").await.unwrap();
        let source = db
            .insert_source("Blog", "https://example.com/feed.xml", user.id)
            .await
            .unwrap();
        (db, source.id)
    }

    #[test]
    fn test_parse_pub_date_numeric_zone() {
        assert_eq!(
            parse_pub_date("Mon, 02 Jan 2006 15:04:05 -0700").unwrap(),
            1_136_239_445
        );
        assert_eq!(
            parse_pub_date("  Mon, 02 Jan 2006 22:04:05 +0000\n").unwrap(),
            1_136_239_445
        );
    }

    #[test]
    fn test_parse_pub_date_rejects_other_layouts() {
        assert!(parse_pub_date("2006-01-02T15:04:05Z").is_err());
        assert!(parse_pub_date("Mon, 02 Jan 2006 15:04:05 GMT").is_err());
        assert!(parse_pub_date("").is_err());
    }

    #[test]
    fn test_natural_key_prefers_link_then_guid() {
        let mut it = item("A", " https://example.com/a ", "");
        it.guid = Some("guid-a".to_string());
        assert_eq!(natural_key(&it), "https://example.com/a");

        it.link.clear();
        assert_eq!(natural_key(&it), "guid-a");

        it.guid = None;
        let hashed = natural_key(&it);
        assert_eq!(hashed.len(), 64);
        assert!(hashed.chars().all(|c| c.is_ascii_hexdigit()));
    }

    proptest! {
        #[test]
        fn test_hashed_key_is_deterministic(title in ".*", description in ".*") {
            let a = SyndicationItem { title: title.clone(), description: description.clone(), ..Default::default() };
            let b = SyndicationItem { title, description, ..Default::default() };
            prop_assert_eq!(natural_key(&a), natural_key(&b));
        }
    }

    #[tokio::test]
    async fn test_reconcile_twice_is_idempotent() {
        let (db, source_id) = test_db_with_source().await;
        let doc = SyndicationDocument {
            items: vec![
                item("First", "https://example.com/1", "Mon, 02 Jan 2006 15:04:05 -0700"),
                item("Second", "https://example.com/2", "Tue, 03 Jan 2006 15:04:05 -0700"),
            ],
            ..Default::default()
        };

        assert_eq!(reconcile(&db, source_id, &doc).await.unwrap(), 2);
        assert_eq!(reconcile(&db, source_id, &doc).await.unwrap(), 0);
        assert_eq!(db.count_posts().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_counts_only_new_items() {
        let (db, source_id) = test_db_with_source().await;
        let first = SyndicationDocument {
            items: vec![item("A", "https://example.com/a", "Mon, 02 Jan 2006 15:04:05 -0700")],
            ..Default::default()
        };
        reconcile(&db, source_id, &first).await.unwrap();

        let second = SyndicationDocument {
            items: vec![
                item("B", "https://example.com/b", "Tue, 03 Jan 2006 15:04:05 -0700"),
                item("A", "https://example.com/a", "Mon, 02 Jan 2006 15:04:05 -0700"),
            ],
            ..Default::default()
        };
        assert_eq!(reconcile(&db, source_id, &second).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bad_date_stops_document() {
        let (db, source_id) = test_db_with_source().await;
        let doc = SyndicationDocument {
            items: vec![
                item("One", "https://example.com/1", "Mon, 02 Jan 2006 15:04:05 -0700"),
                item("Two", "https://example.com/2", "yesterday-ish"),
                item("Three", "https://example.com/3", "Wed, 04 Jan 2006 15:04:05 -0700"),
            ],
            ..Default::default()
        };

        let err = reconcile(&db, source_id, &doc).await.unwrap_err();
        match err {
            ReconcileError::DateParse { index, ref value, .. } => {
                assert_eq!(index, 1);
                assert_eq!(value, "yesterday-ish");
            }
            e => panic!("Expected DateParse, got {:?}", e),
        }

        let stored = db.get_posts_for_source(source_id, None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "One");
    }

    #[tokio::test]
    async fn test_persistence_failure_aborts() {
        let (db, _) = test_db_with_source().await;
        let doc = SyndicationDocument {
            items: vec![
                item("One", "https://example.com/1", "Mon, 02 Jan 2006 15:04:05 -0700"),
                item("Two", "https://example.com/2", "Tue, 03 Jan 2006 15:04:05 -0700"),
            ],
            ..Default::default()
        };

        // No such source: the foreign key rejects the first insert
        let err = reconcile(&db, 9999, &doc).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Persistence { index: 0, .. }));
        assert_eq!(db.count_posts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_empty_document() {
        let (db, source_id) = test_db_with_source().await;
        let inserted = reconcile(&db, source_id, &SyndicationDocument::default())
            .await
            .unwrap();
        assert_eq!(inserted, 0);
    }
}
