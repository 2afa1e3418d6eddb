//! Mock catalog for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::catalog::{Catalog, CatalogError, MediaDescriptor};

/// Mock implementation of the Catalog trait. Returns a fixed list.
#[derive(Debug, Default)]
pub struct MockCatalog {
    items: Mutex<Vec<MediaDescriptor>>,
    fail: Mutex<bool>,
    fetches: AtomicUsize,
}

impl MockCatalog {
    pub fn new(items: Vec<MediaDescriptor>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Default::default()
        }
    }

    /// Every fetch fails as if retries were exhausted.
    pub fn fail_always(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn fetch(&self) -> Result<Vec<MediaDescriptor>, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            return Err(CatalogError::RetryExhausted {
                attempts: 1,
                last_error: "mock failure".to_string(),
            });
        }
        Ok(self.items.lock().unwrap().clone())
    }
}
