//! PetAdmin client - data access for the pet-game admin dashboard
//!
//! This crate talks to the admin REST backend and gives list screens what
//! they need: normalized records, a TTL cache with fetch coalescing, a
//! search/filter/sort/paginate pipeline, debouncing, and flash messages
//! that survive a navigation.

pub mod api_client;
pub mod auth_session;
pub mod cache;
pub mod config;
pub mod debounce;
pub mod list;
pub mod logging;
pub mod notify;
pub mod query;
pub mod repository;
pub mod routes;
pub mod storage;

pub use api_client::{ApiClient, Transport};
pub use auth_session::AuthSession;
pub use cache::{CacheKey, ResourceCache};
pub use config::ClientConfig;
pub use list::ListController;
pub use notify::{Notification, NotificationBridge, NotificationKind};
pub use query::{Filter, QueryResult, QueryState, SortSpec};
pub use repository::{ReadOutcome, Repository};
