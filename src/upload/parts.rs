//! Uploaded-parts listing
//!
//! ListParts is paginated by a part-number marker. [`uploaded_parts`] turns
//! the cursor into a lazy stream of pages: nothing is fetched until the
//! stream is polled, and every poll is exactly one provider call. The stream
//! ends after a page that is not truncated or carries no next marker.

use crate::s3::{Part, StorageAdapter, StorageError};
use futures::stream::{self, Stream, TryStreamExt};

/// Lazy stream of ListParts pages for one upload
pub fn uploaded_parts<'a>(
    adapter: &'a dyn StorageAdapter,
    key: &'a str,
    upload_id: &'a str,
) -> impl Stream<Item = Result<Vec<Part>, StorageError>> + Send + 'a {
    // State: Some(marker) while another page is due, None once exhausted
    stream::try_unfold(Some(None), move |cursor: Option<Option<String>>| async move {
        let Some(marker) = cursor else {
            return Ok(None);
        };

        let page = adapter.list_parts(key, upload_id, marker).await?;
        let next = match page.next_part_number_marker {
            Some(marker) if page.is_truncated => Some(Some(marker)),
            _ => None,
        };

        tracing::debug!(
            parts = page.parts.len(),
            truncated = page.is_truncated,
            "Fetched parts page"
        );

        Ok(Some((page.parts, next)))
    })
}

/// All uploaded parts, concatenated in provider order
///
/// A failure on any page aborts the listing; no partial result is returned.
pub async fn list_all_parts(
    adapter: &dyn StorageAdapter,
    key: &str,
    upload_id: &str,
) -> Result<Vec<Part>, StorageError> {
    uploaded_parts(adapter, key, upload_id).try_concat().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::{MockStorageAdapter, PartsPage};
    use futures::StreamExt;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn part(n: i32) -> Part {
        Part {
            part_number: n,
            etag: format!("\"etag-{}\"", n),
            size: 5 * 1024 * 1024,
        }
    }

    fn page(parts: Vec<Part>, truncated: bool, next: Option<&str>) -> PartsPage {
        PartsPage {
            parts,
            is_truncated: truncated,
            next_part_number_marker: next.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_single_page() {
        let mut adapter = MockStorageAdapter::new();
        adapter
            .expect_list_parts()
            .with(eq("key"), eq("upload"), eq(None))
            .times(1)
            .returning(|_, _, _| Ok(page(vec![part(1), part(2)], false, None)));

        let parts = list_all_parts(&adapter, "key", "upload").await.unwrap();
        assert_eq!(parts, vec![part(1), part(2)]);
    }

    #[tokio::test]
    async fn test_pages_concatenated_in_order_with_one_call_each() {
        let mut adapter = MockStorageAdapter::new();
        let mut seq = Sequence::new();
        adapter
            .expect_list_parts()
            .with(eq("key"), eq("upload"), eq(None))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(vec![part(1), part(2)], true, Some("2"))));
        adapter
            .expect_list_parts()
            .with(eq("key"), eq("upload"), eq(Some("2".to_string())))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(vec![part(3), part(4)], true, Some("4"))));
        adapter
            .expect_list_parts()
            .with(eq("key"), eq("upload"), eq(Some("4".to_string())))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(vec![part(5)], false, None)));

        let parts = list_all_parts(&adapter, "key", "upload").await.unwrap();
        assert_eq!(parts, (1..=5).map(part).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_truncated_without_marker_terminates() {
        let mut adapter = MockStorageAdapter::new();
        adapter
            .expect_list_parts()
            .times(1)
            .returning(|_, _, _| Ok(page(vec![part(1)], true, None)));

        let parts = list_all_parts(&adapter, "key", "upload").await.unwrap();
        assert_eq!(parts, vec![part(1)]);
    }

    #[tokio::test]
    async fn test_not_truncated_ignores_marker() {
        let mut adapter = MockStorageAdapter::new();
        adapter
            .expect_list_parts()
            .times(1)
            .returning(|_, _, _| Ok(page(vec![part(1)], false, Some("1"))));

        let parts = list_all_parts(&adapter, "key", "upload").await.unwrap();
        assert_eq!(parts, vec![part(1)]);
    }

    #[tokio::test]
    async fn test_failure_mid_pagination_aborts() {
        let mut adapter = MockStorageAdapter::new();
        let mut seq = Sequence::new();
        adapter
            .expect_list_parts()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(vec![part(1)], true, Some("1"))));
        adapter
            .expect_list_parts()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Err(StorageError::Provider {
                    operation: "ListParts",
                    code: Some("InternalError".into()),
                    message: "boom".into(),
                })
            });

        let result = list_all_parts(&adapter, "key", "upload").await;
        assert!(matches!(result, Err(StorageError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let mut adapter = MockStorageAdapter::new();
        adapter
            .expect_list_parts()
            .times(1)
            .returning(|_, _, _| Ok(page(vec![part(1)], true, Some("1"))));

        // Only the first page is requested; the second is never polled
        let mut pages = Box::pin(uploaded_parts(&adapter, "key", "upload"));
        let first = pages.next().await.unwrap().unwrap();
        assert_eq!(first, vec![part(1)]);
    }
}
