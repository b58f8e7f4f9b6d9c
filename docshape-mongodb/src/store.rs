use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, Database,
    options::{
        AggregateOptions as MongoAggregateOptions, ClientOptions, FindOneOptions as MongoFindOneOptions,
        FindOptions as MongoFindOptions, ReadPreference, SelectionCriteria,
        UpdateOptions as MongoUpdateOptions,
    },
};
use tracing::{error, info};

use docshape_core::{
    backend::{
        AggregateOptions, DeleteResult, FindOneOptions, FindOptions, StoreBackend, StoreBackendBuilder,
        UpdateOptions, UpdateResult,
    },
    cursor::DocumentCursor,
    error::{DocumentStoreError, DocumentStoreResult},
    query::Filters,
};

use crate::query::{filter_document, sort_document};

/// Default time allowed for connecting and selecting a server.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable holding the connection string.
pub const DSN_ENV: &str = "MONGO_DSN";
/// Environment variable holding the database name.
pub const DATABASE_ENV: &str = "DATABASE_NAME";

/// A [`StoreBackend`] backed by a MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: Database,
}

impl MongoDbStore {
    pub fn new(client: Client, database: &str) -> Self {
        let database = client.database(database);
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    /// Connects with default settings and halts the process on failure.
    ///
    /// Intended for application start-up, where there is nothing sensible to
    /// do without a database. Use [`MongoDbStore::builder`] to handle the
    /// error instead.
    pub async fn init(dsn: &str, database: &str) -> Self {
        match Self::builder(dsn, database).build().await {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, database, "could not connect to MongoDB");
                panic!("could not connect to MongoDB: {e}");
            },
        }
    }

    /// Returns the database handle this store operates on.
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn get_collection(&self, name: &str) -> MongoCollection<Document> {
        self.database.collection(name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find_one(
        &self,
        filter: Filters,
        options: FindOneOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let mut find_options = MongoFindOneOptions::default();
        find_options.projection = options.projection;
        find_options.sort = options.sort.as_deref().map(sort_document);

        self.get_collection(collection)
            .find_one(filter_document(&filter))
            .with_options(find_options)
            .await
            .map_err(DocumentStoreError::backend)
    }

    async fn find(
        &self,
        filter: Filters,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<DocumentCursor> {
        let mut find_options = MongoFindOptions::default();
        find_options.projection = options.projection;
        find_options.sort = options.sort.as_deref().map(sort_document);
        find_options.skip = options.skip;
        find_options.limit = options.limit;

        let cursor = self
            .get_collection(collection)
            .find(filter_document(&filter))
            .with_options(find_options)
            .await
            .map_err(DocumentStoreError::backend)?;

        Ok(DocumentCursor::new(cursor.map_err(DocumentStoreError::backend)))
    }

    async fn count_documents(&self, filter: Filters, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(filter_document(&filter))
            .await
            .map_err(DocumentStoreError::backend)
    }

    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        Ok(
            self.get_collection(collection)
                .insert_one(document)
                .await
                .map_err(DocumentStoreError::backend)?
                .inserted_id
        )
    }

    async fn replace_one(
        &self,
        filter: Filters,
        replacement: Document,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        let result = self
            .get_collection(collection)
            .replace_one(filter_document(&filter), replacement)
            .await
            .map_err(DocumentStoreError::backend)?;

        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn update_many(
        &self,
        filter: Filters,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        let mut update_options = MongoUpdateOptions::default();
        update_options.upsert = options.upsert;

        let result = self
            .get_collection(collection)
            .update_many(filter_document(&filter), update)
            .with_options(update_options)
            .await
            .map_err(DocumentStoreError::backend)?;

        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn delete_one(&self, filter: Filters, collection: &str) -> DocumentStoreResult<DeleteResult> {
        let result = self
            .get_collection(collection)
            .delete_one(filter_document(&filter))
            .await
            .map_err(DocumentStoreError::backend)?;

        Ok(DeleteResult { deleted_count: result.deleted_count })
    }

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<DocumentCursor> {
        let mut aggregate_options = MongoAggregateOptions::default();
        aggregate_options.allow_disk_use = options.allow_disk_use;
        aggregate_options.batch_size = options.batch_size;

        let cursor = self
            .get_collection(collection)
            .aggregate(pipeline)
            .with_options(aggregate_options)
            .await
            .map_err(DocumentStoreError::backend)?;

        Ok(DocumentCursor::new(cursor.map_err(DocumentStoreError::backend)))
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Builds a [`MongoDbStore`], verifying reachability of the primary before
/// handing it out.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    connect_timeout: Duration,
    app_name: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            app_name: None,
        }
    }

    /// Reads the connection string and database name from `MONGO_DSN` and
    /// `DATABASE_NAME`.
    pub fn from_env() -> DocumentStoreResult<Self> {
        let read = |key: &str| {
            std::env::var(key)
                .map_err(|e| DocumentStoreError::Initialization(format!("{key}: {e}")))
        };

        Ok(Self::new(&read(DSN_ENV)?, &read(DATABASE_ENV)?))
    }

    /// Bounds both connection establishment and server selection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Reported to the server in the connection handshake.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        options.connect_timeout = Some(self.connect_timeout);
        options.server_selection_timeout = Some(self.connect_timeout);
        if self.app_name.is_some() {
            options.app_name = self.app_name;
        }

        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;
        let store = MongoDbStore::new(client, &self.database);

        store
            .database
            .run_command(doc! { "ping": 1 })
            .selection_criteria(SelectionCriteria::ReadPreference(ReadPreference::Primary))
            .await
            .map_err(|e| DocumentStoreError::Initialization(format!("ping failed: {e}")))?;

        info!(database = %self.database, "connected to MongoDB");

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshape_core::query::QueryFilter;

    #[test]
    fn builder_defaults() {
        let builder = MongoDbStore::builder("mongodb://localhost:27017", "docshape");

        assert_eq!(builder.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(builder.app_name, None);

        let builder = builder
            .connect_timeout(Duration::from_secs(2))
            .app_name("docshape-tests");

        assert_eq!(builder.connect_timeout, Duration::from_secs(2));
        assert_eq!(builder.app_name.as_deref(), Some("docshape-tests"));
    }

    #[tokio::test]
    async fn unreachable_server_fails_to_build() {
        let result = MongoDbStore::builder("mongodb://127.0.0.1:1", "docshape")
            .connect_timeout(Duration::from_millis(200))
            .build()
            .await;

        assert!(matches!(result, Err(DocumentStoreError::Initialization(_))));
    }

    #[tokio::test]
    async fn malformed_dsn_fails_to_build() {
        let result = MongoDbStore::builder("not-a-dsn", "docshape").build().await;

        assert!(matches!(result, Err(DocumentStoreError::Initialization(_))));
    }

    #[tokio::test]
    #[ignore = "requires MONGO_DSN and DATABASE_NAME"]
    async fn round_trip_against_live_server() {
        let store = MongoDbStoreBuilder::from_env()
            .unwrap()
            .build()
            .await
            .unwrap();
        let collection = "docshape_round_trip";

        let id = store
            .insert_one(doc! { "name": "Ivy", "is_deleted": false }, collection)
            .await
            .unwrap();

        let found = store
            .find_one(
                QueryFilter::new().add_filter("_id", id.clone()).into_filters(),
                FindOneOptions::default(),
                collection,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get_str("name").unwrap(), "Ivy");

        let deleted = store
            .delete_one(vec![("_id".to_string(), id)], collection)
            .await
            .unwrap();
        assert_eq!(deleted.deleted_count, 1);

        store.shutdown().await.unwrap();
    }
}
