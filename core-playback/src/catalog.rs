//! Catalog repository consumed by the pipeline.
//!
//! The core never talks to the catalog backend directly; hosts implement
//! [`CatalogRepository`] over their REST client. Failures are opaque to the
//! core and surface unchanged to the caller.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Album, Track};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Catalog error: {0}")]
    Other(String),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// One page of albums, `page` counted from 0.
    async fn get_albums(&self, page: u32, limit: u32) -> CatalogResult<Vec<Album>>;

    async fn get_album_by_id(&self, album_id: &str) -> CatalogResult<Album>;

    async fn get_tracks_by_album_id(&self, album_id: &str) -> CatalogResult<Vec<Track>>;

    async fn get_track_by_id(&self, track_id: &str) -> CatalogResult<Track>;
}
