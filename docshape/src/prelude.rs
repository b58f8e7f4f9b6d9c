//! Convenient re-exports of commonly used types from docshape.
//!
//! ```ignore
//! use docshape::prelude::*;
//! ```
//!
//! `StoreBackend` is left out: its methods share names with
//! [`DynStoreBackend`], which hooks receive. Import it from
//! [`crate::backend`] when calling a backend directly.

pub use docshape_core::{
    backend::{AggregateOptions, DeleteResult, DynStoreBackend, StoreBackendBuilder, UpdateOptions, UpdateResult},
    collection::Collection,
    cursor::DocumentCursor,
    document::{Base, Document, DocumentExt, DocumentHooks, HookResult},
    error::{DocumentStoreError, DocumentStoreResult, HookStage},
    page::{AggregationPaginatedResult, PageOptions, PaginatedResult, Paginator},
    query::{Filters, QueryFilter, Sort, SortDirection},
    store::DocumentStore,
    update::UpdateManyBuilder,
};
pub use docshape_macros::Document;
