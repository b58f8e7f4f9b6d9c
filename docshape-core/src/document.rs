//! The document lifecycle contract and lifecycle hooks.
//!
//! Every persistable type embeds a [`Base`] (flattened into the stored document)
//! and implements [`Document`], which exposes identity, timestamps, the
//! soft-delete flag and the transient "new" state. Types opt into lifecycle
//! callbacks by overriding methods of [`DocumentHooks`]; a hook that is not
//! overridden does nothing.
//!
//! # Example
//!
//! ```ignore
//! use docshape::document::{Base, Document, DocumentHooks};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(flatten)]
//!     pub base: Base,
//!     pub first_name: String,
//! }
//!
//! impl Document for User {
//!     fn collection_name() -> &'static str { "users" }
//!     fn base(&self) -> &Base { &self.base }
//!     fn base_mut(&mut self) -> &mut Base { &mut self.base }
//! }
//!
//! impl DocumentHooks for User {}
//!
//! let mut user = User::default();
//! assert!(!user.can_save());
//! user.setup()?;
//! assert!(user.can_save() && user.is_new());
//! ```

use async_trait::async_trait;
use bson::{
    DateTime, Document as BsonDocument,
    de::deserialize_from_document,
    oid::ObjectId,
    ser::serialize_to_document,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;

use crate::{
    backend::DynStoreBackend,
    error::{BoxError, DocumentStoreError, DocumentStoreResult},
};

/// Result type returned by lifecycle hooks.
pub type HookResult = Result<(), BoxError>;

/// Layout used by [`Base::format_date_short`], e.g. `Jan 02, 2006`.
pub const DATE_SHORT_FORMAT: &str = "%b %d, %Y";

/// Layout used by [`Base::format_date_time_short`], e.g. `Jan 02, 2006 - 15:04`.
pub const DATE_TIME_SHORT_FORMAT: &str = "%b %d, %Y - %H:%M";

/// Fields shared by every document.
///
/// Embed it with `#[serde(flatten)]` so that `_id`, `created_at`, `updated_at`,
/// `deleted_at` and `is_deleted` are stored at the top level of the document.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Base {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub created_at: Option<DateTime>,
    #[serde(default)]
    pub updated_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(skip)]
    is_new: bool,
}

/// A timestamp rendered in the layouts used for display.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FormattedTimestamp {
    pub date_short: String,
    pub date_time_short: String,
    pub iso: String,
}

impl Base {
    /// Assigns a fresh identity and both timestamps, and marks the instance as new.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::AlreadySetUp`] if an identity is already assigned.
    pub fn setup(&mut self) -> DocumentStoreResult<()> {
        if self.id.is_some() {
            return Err(DocumentStoreError::AlreadySetUp);
        }

        let now = DateTime::now();
        self.id = Some(ObjectId::new());
        self.created_at = Some(now);
        self.updated_at = Some(now);
        self.is_new = true;

        Ok(())
    }

    /// `true` once identity and both timestamps are set.
    pub fn can_save(&self) -> bool {
        self.id.is_some() && self.created_at.is_some() && self.updated_at.is_some()
    }

    pub fn before_update(&mut self) {
        self.updated_at = Some(DateTime::now());
    }

    pub fn before_soft_delete(&mut self) {
        self.is_deleted = true;
        self.deleted_at = Some(DateTime::now());
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// When `true`, the next save inserts; when `false`, it replaces the stored document.
    pub fn set_is_new(&mut self, status: bool) {
        self.is_new = status;
    }

    /// Formats a timestamp with a `chrono` layout string.
    pub fn format_date(dt: DateTime, layout: &str) -> String {
        dt.to_chrono().format(layout).to_string()
    }

    pub fn format_date_short(dt: DateTime) -> String {
        Self::format_date(dt, DATE_SHORT_FORMAT)
    }

    pub fn format_date_time_short(dt: DateTime) -> String {
        Self::format_date(dt, DATE_TIME_SHORT_FORMAT)
    }

    pub fn formatted_created_at(&self) -> Option<FormattedTimestamp> {
        self.created_at.map(Self::formatted)
    }

    pub fn formatted_updated_at(&self) -> Option<FormattedTimestamp> {
        self.updated_at.map(Self::formatted)
    }

    pub fn formatted_deleted_at(&self) -> Option<FormattedTimestamp> {
        self.deleted_at.map(Self::formatted)
    }

    /// Creation and update timestamps, keyed `createdAt` and `updatedAt`.
    pub fn timestamps(&self) -> BTreeMap<String, FormattedTimestamp> {
        let mut timestamps = BTreeMap::new();

        if let Some(created_at) = self.formatted_created_at() {
            timestamps.insert("createdAt".to_string(), created_at);
        }
        if let Some(updated_at) = self.formatted_updated_at() {
            timestamps.insert("updatedAt".to_string(), updated_at);
        }

        timestamps
    }

    /// Like [`Base::timestamps`], plus `deletedAt` once the document is soft-deleted.
    pub fn all_timestamps(&self) -> BTreeMap<String, FormattedTimestamp> {
        let mut timestamps = self.timestamps();

        if let Some(deleted_at) = self.formatted_deleted_at() {
            timestamps.insert("deletedAt".to_string(), deleted_at);
        }

        timestamps
    }

    fn formatted(dt: DateTime) -> FormattedTimestamp {
        FormattedTimestamp {
            date_short: Self::format_date_short(dt),
            date_time_short: Self::format_date_time_short(dt),
            iso: dt.to_chrono().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Optional lifecycle callbacks.
///
/// Each hook receives the active store and may fail, which aborts the
/// enclosing operation. Every method defaults to doing nothing, so a type
/// registers a capability simply by overriding the corresponding method.
///
/// # Example
///
/// ```ignore
/// #[async_trait]
/// impl DocumentHooks for User {
///     async fn pre_create(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
///         self.email = self.email.to_lowercase();
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait DocumentHooks: Send + Sync {
    /// Runs before a new document is inserted.
    async fn pre_create(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        Ok(())
    }

    /// Runs after a new document was inserted.
    async fn post_create(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        Ok(())
    }

    /// Runs before an existing document is replaced.
    async fn pre_update(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        Ok(())
    }

    /// Runs after an existing document was replaced.
    async fn post_update(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        Ok(())
    }

    async fn pre_soft_delete(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        Ok(())
    }

    async fn post_soft_delete(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        Ok(())
    }

    async fn pre_hard_delete(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        Ok(())
    }

    async fn post_hard_delete(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        Ok(())
    }

    /// Runs on the target before any single-document read.
    async fn pre_find_one(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        Ok(())
    }

    /// Runs on the target after it was filled by a single-document read.
    async fn post_find_one(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
        Ok(())
    }
}

/// Core trait that all persistable documents implement.
///
/// Only [`Document::collection_name`], [`Document::base`] and
/// [`Document::base_mut`] are required; the lifecycle methods delegate to the
/// embedded [`Base`]. `#[derive(Document)]` generates the required methods.
pub trait Document: DocumentHooks + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;

    fn base(&self) -> &Base;

    fn base_mut(&mut self) -> &mut Base;

    /// Assigns identity and timestamps. May only succeed once per document.
    fn setup(&mut self) -> DocumentStoreResult<()> {
        self.base_mut().setup()
    }

    /// `true` when the document has been set up and may be persisted.
    fn can_save(&self) -> bool {
        self.base().can_save()
    }

    /// Refreshes the update timestamp.
    fn before_update(&mut self) {
        self.base_mut().before_update()
    }

    /// Sets the deleted flag and the deletion timestamp.
    fn before_soft_delete(&mut self) {
        self.base_mut().before_soft_delete()
    }

    fn id(&self) -> Option<ObjectId> {
        self.base().id
    }

    fn created_at(&self) -> Option<chrono::DateTime<Utc>> {
        self.base().created_at.map(|dt| dt.to_chrono())
    }

    fn updated_at(&self) -> Option<chrono::DateTime<Utc>> {
        self.base().updated_at.map(|dt| dt.to_chrono())
    }

    fn deleted_at(&self) -> Option<chrono::DateTime<Utc>> {
        self.base().deleted_at.map(|dt| dt.to_chrono())
    }

    fn is_deleted(&self) -> bool {
        self.base().is_deleted
    }

    fn is_new(&self) -> bool {
        self.base().is_new()
    }

    fn set_is_new(&mut self, status: bool) {
        self.base_mut().set_is_new(status)
    }
}

/// BSON conversions for documents, implemented for every [`Document`].
pub trait DocumentExt: Document {
    /// Serializes this document into a BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the value is not a document.
    fn to_bson_document(&self) -> DocumentStoreResult<BsonDocument>;

    /// Deserializes a document from a BSON document.
    fn from_bson_document(document: BsonDocument) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson_document(&self) -> DocumentStoreResult<BsonDocument> {
        serialize_to_document(self)
            .map_err(|e| DocumentStoreError::InvalidDocument(e.to_string()))
    }

    fn from_bson_document(document: BsonDocument) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_document(document)?)
    }
}
