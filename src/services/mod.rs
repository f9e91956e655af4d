// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod catalog;
pub mod completion;
pub mod generation;
pub mod merge;
pub mod progress;
pub mod streak;

pub use catalog::{CatalogError, CatalogService};
pub use completion::CompletionEvent;
pub use generation::GenerationService;
pub use progress::ProgressService;
