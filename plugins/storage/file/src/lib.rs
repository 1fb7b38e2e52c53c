mod config;
mod storage;

use std::sync::Arc;

use messenger_api::{MessageStore, StoreFactory};

pub use config::FileStoreConfig;
pub use storage::FileStore;

// ════════════════════════════════════════════════════════════════
//  Factory
// ════════════════════════════════════════════════════════════════

pub struct FileStoreFactory;

impl StoreFactory for FileStoreFactory {
    fn create(&self, config_json: &str) -> Result<Arc<dyn MessageStore>, serde_json::Error> {
        let cfg: FileStoreConfig = serde_json::from_str(config_json)?;
        Ok(Arc::new(FileStore::new(&cfg)))
    }
}
