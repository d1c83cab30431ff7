use config::Config;
use test_support::TempRoot;

use crate::AppContext;

/// Context backed by a fresh SQLite file and upload directory under `root`.
pub async fn test_context(root: &TempRoot) -> AppContext {
    let config = Config {
        database_url: root.db_url(),
        upload_dir: root.upload_dir(),
        host: config::DEFAULT_HOST.to_string(),
        port: 0,
    };
    AppContext::new(&config).await.unwrap()
}
