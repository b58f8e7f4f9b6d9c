//! Procedural macros for the docshape project.
//!
//! `#[derive(Document)]` wires a struct's embedded `Base` and its collection
//! name into the `Document` trait:
//!
//! ```ignore
//! use docshape::{document::Base, Document};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Document)]
//! #[document(collection = "users")]
//! pub struct User {
//!     #[serde(flatten)]
//!     pub base: Base,
//!     pub name: String,
//! }
//! ```
//!
//! The `Base` field is the one marked `#[document(base)]`, or else the first
//! field whose type is named `Base`. An empty `DocumentHooks` impl is emitted as
//! well; add `#[document(hooks)]` to the struct to write your own instead.

mod derive_document;

use proc_macro::TokenStream;

#[proc_macro_derive(Document, attributes(document))]
pub fn document(input: TokenStream) -> TokenStream {
    derive_document::derive_document(input.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
