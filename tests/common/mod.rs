// SPDX-License-Identifier: MIT

use finlearn::config::Config;
use finlearn::db::FirestoreDb;
use finlearn::routes::create_router;
use finlearn::services::{CatalogService, GenerationService, ProgressService};
use finlearn::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// A small fixed catalog for router tests.
#[allow(dead_code)]
pub fn test_catalog() -> CatalogService {
    CatalogService::load_from_json(
        r#"[
            {"id": "budgeting", "title": "Budgeting Basics", "required_points": 0,
             "modules": [
                {"id": "budgeting-1", "title": "Your First Budget",
                 "key_points": ["Track income and expenses", "Pay yourself first"]}
             ]},
            {"id": "investing", "title": "Investing 101", "required_points": 200, "modules": []}
        ]"#,
    )
    .expect("test catalog should parse")
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();
    let catalog_service = test_catalog();
    let generation_service = GenerationService::new("", "");
    let progress_service = ProgressService::new(db.clone());

    let state = Arc::new(AppState {
        config,
        db,
        catalog_service,
        generation_service,
        progress_service,
    });

    (create_router(state.clone()), state)
}
