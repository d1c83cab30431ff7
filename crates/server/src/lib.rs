use config::{Config, ConfigError};
use db::{DBService, DbErr};
use services::services::image::{ImageError, ImageService};
use thiserror::Error;

pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;

#[cfg(test)]
mod test_support;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Process-wide handles shared by every request: the database pool and the
/// upload directory. Built once at startup and handed to the router as state.
#[derive(Clone)]
pub struct AppContext {
    db: DBService,
    images: ImageService,
}

impl AppContext {
    pub async fn new(config: &Config) -> Result<Self, ContextError> {
        let upload_dir = config.ensure_upload_dir()?;
        let images = ImageService::new(upload_dir)?;
        let db = DBService::new(&config.database_url).await?;
        Ok(Self { db, images })
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn images(&self) -> &ImageService {
        &self.images
    }
}
