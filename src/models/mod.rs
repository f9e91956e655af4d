// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod progress;
pub mod topic;
pub mod user;

pub use progress::{ModuleProgress, ProgressRecord, TopicProgress};
pub use topic::{ModuleRef, Topic};
pub use user::User;
