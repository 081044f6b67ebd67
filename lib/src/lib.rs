//! `modcat` exposes a Skosmos-style vocabulary REST API as a read-only Linked-Data catalogue
//! described with the MOD, DCAT, DCTERMS and Hydra vocabularies.
//!
//! Every request is answered from scratch: the upstream is queried, its JSON (or Turtle dump)
//! is re-shaped into an in-memory [`oxigraph::model::Graph`], collection endpoints get a Hydra
//! view of the requested page, and the graph is serialized as JSON-LD, Turtle or RDF/XML.

extern crate derive_builder;

pub mod api;
pub mod builder;
pub mod config;
pub mod consts;
pub mod errors;
pub mod fetch;
pub mod formats;
pub mod negotiate;
pub mod query;
pub mod serialize;
pub mod server;
pub mod view;

pub use api::{init_logging, Catalogue, ResourceKind};
pub use config::Config;
pub use errors::{CatalogueError, Result};
pub use server::{create_router, serve, AppState};
