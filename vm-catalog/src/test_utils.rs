use crate::catalog::Catalog;
use crate::db::{create_pool, run_migrations};
use crate::error::{CatalogError, Result};
use crate::host::HostProfile;
use crate::media::{MediaInspector, MediaKind};
use crate::messages;
use crate::reason;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// ISO registered with every test catalog's media inspector
pub const MOCK_ISO: &str = "/tmp/mock.iso";

/// Host memory of the fixed test host, in MiB
pub const TEST_HOST_MEMORY_MIB: u64 = 8192;

/// Media inspector backed by an in-memory path table
#[derive(Debug, Default)]
pub struct StaticMediaInspector {
    media: RwLock<HashMap<String, MediaKind>>,
}

impl StaticMediaInspector {
    pub fn new() -> Self {
        let inspector = Self::default();
        inspector.insert(
            MOCK_ISO,
            MediaKind::Iso {
                distro: Some("ubuntu".to_string()),
                version: Some("14.04".to_string()),
            },
        );
        inspector
    }

    pub fn insert(&self, path: &str, kind: MediaKind) {
        self.media
            .write()
            .expect("media table lock poisoned")
            .insert(path.to_string(), kind);
    }

    pub fn remove(&self, path: &str) {
        self.media
            .write()
            .expect("media table lock poisoned")
            .remove(path);
    }
}

impl MediaInspector for StaticMediaInspector {
    fn inspect(&self, path: &str) -> Result<MediaKind> {
        self.media
            .read()
            .expect("media table lock poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| {
                CatalogError::InvalidParameter(reason!(
                    messages::TEMPLATE_INVALID_CDROM,
                    param = path
                ))
            })
    }

    fn exists(&self, path: &str) -> bool {
        self.media
            .read()
            .expect("media table lock poisoned")
            .contains_key(path)
    }
}

/// Helper to create an in-memory catalog with migrations applied and the
/// default network and storage pool seeded
pub async fn create_test_catalog() -> Catalog {
    create_test_catalog_with_media().await.0
}

/// Like [`create_test_catalog`], also returning the media table so tests can
/// add or remove media
pub async fn create_test_catalog_with_media() -> (Catalog, Arc<StaticMediaInspector>) {
    let pool = create_pool(None)
        .await
        .expect("Failed to create in-memory database");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let media = Arc::new(StaticMediaInspector::new());
    let catalog = Catalog::new(
        pool,
        HostProfile::fixed("x86_64", TEST_HOST_MEMORY_MIB),
        media.clone(),
    );
    catalog
        .seed_defaults()
        .await
        .expect("Failed to seed default resources");

    (catalog, media)
}
