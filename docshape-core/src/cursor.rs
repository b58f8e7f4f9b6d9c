//! Caller-owned cursors over multi-document results.

use bson::{Document, de::deserialize_from_document};
use futures::{
    Stream, StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use serde::de::DeserializeOwned;
use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use crate::error::DocumentStoreResult;

/// A stream of raw documents returned by a multi-document read.
///
/// Backends hand out a cursor that may hold server-side resources. Read it to
/// the end and call [`DocumentCursor::close`] (or drop it) to release them.
pub struct DocumentCursor {
    inner: BoxStream<'static, DocumentStoreResult<Document>>,
}

impl DocumentCursor {
    /// Wraps a backend stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = DocumentStoreResult<Document>> + Send + 'static,
    {
        Self { inner: stream.boxed() }
    }

    /// Creates a cursor over documents that are already in memory.
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self::new(stream::iter(documents.into_iter().map(Ok)))
    }

    /// Returns the next raw document, or `None` when the cursor is exhausted.
    pub async fn next_document(&mut self) -> Option<DocumentStoreResult<Document>> {
        self.inner.next().await
    }

    /// Returns the next document decoded into `T`.
    pub async fn next<T: DeserializeOwned>(&mut self) -> Option<DocumentStoreResult<T>> {
        Some(
            self.next_document()
                .await?
                .and_then(|document| Ok(deserialize_from_document(document)?)),
        )
    }

    /// Reads every remaining document into `T` and releases the cursor.
    pub async fn collect<T: DeserializeOwned>(self) -> DocumentStoreResult<Vec<T>> {
        self.inner
            .and_then(|document| async move { Ok(deserialize_from_document::<T>(document)?) })
            .try_collect()
            .await
    }

    /// Releases the cursor.
    pub async fn close(self) {
        drop(self.inner);
    }
}

impl Stream for DocumentCursor {
    type Item = DocumentStoreResult<Document>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for DocumentCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCursor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        name: String,
    }

    #[tokio::test]
    async fn decodes_documents_in_order() {
        let mut cursor = DocumentCursor::from_documents(vec![
            doc! { "name": "Ivy" },
            doc! { "name": "Asari" },
        ]);

        let first = cursor.next::<Row>().await.unwrap().unwrap();
        assert_eq!(first.name, "Ivy");

        let rest = cursor.collect::<Row>().await.unwrap();
        assert_eq!(rest, vec![Row { name: "Asari".into() }]);
    }

    #[tokio::test]
    async fn exhausted_cursor_yields_none() {
        let mut cursor = DocumentCursor::from_documents(vec![]);

        assert!(cursor.next_document().await.is_none());
        cursor.close().await;
    }
}
