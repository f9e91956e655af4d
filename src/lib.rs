// SPDX-License-Identifier: MIT

//! FinLearn: backend API for a personal-finance learning app.
//!
//! A thin Firestore CRUD layer plus the progress sync/merge core:
//! reconciling device-local learning progress (topics, modules, streaks,
//! points) with the server-held record without ever losing a completion.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{CatalogService, GenerationService, ProgressService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub catalog_service: CatalogService,
    pub generation_service: GenerationService,
    pub progress_service: ProgressService,
}
