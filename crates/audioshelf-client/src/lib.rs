//! Client for the audioshelf catalog service: duplicate groups, hash stats and
//! guarded batch deletion over HTTP.

pub mod catalog;
pub mod error;
pub mod http;
pub mod runner;
pub mod wire;

pub use catalog::{CatalogApi, CatalogClient, reconcile};
pub use error::{ClientError, Result};
pub use http::ApiClient;
pub use runner::ReviewRunner;
pub use wire::{DeleteRequest, DeleteResponse, DuplicatesResponse};
