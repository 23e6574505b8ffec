//! Service layer.
//!
//! One trait per domain area. Handlers only ever see the `Arc<dyn ...>` state
//! aliases below, so tests swap in mocks without touching the router. The Postgres
//! implementations use runtime-checked `sqlx` queries against the schema in
//! `migrations/`.

use std::sync::Arc;

use sqlx::PgPool;

pub mod communities;
pub mod messages;
pub mod notifications;
pub mod posts;
pub mod reports;
pub mod tags;
pub mod users;

pub use communities::{CommunityRepository, PgCommunityRepository};
pub use messages::{MessageRepository, PgMessageRepository};
pub use notifications::{NotificationRepository, PgNotificationRepository};
pub use posts::{PgPostRepository, PostRepository};
pub use reports::{PgReportRepository, ReportRepository};
pub use tags::{PgTagRepository, TagRepository};
pub use users::{PgUserRepository, UserRepository};

pub type UserRepoState = Arc<dyn UserRepository>;
pub type PostRepoState = Arc<dyn PostRepository>;
pub type CommunityRepoState = Arc<dyn CommunityRepository>;
pub type MessageRepoState = Arc<dyn MessageRepository>;
pub type NotificationRepoState = Arc<dyn NotificationRepository>;
pub type ReportRepoState = Arc<dyn ReportRepository>;
pub type TagRepoState = Arc<dyn TagRepository>;

/// Repositories
///
/// Every Postgres-backed service sharing one pool.
#[derive(Clone)]
pub struct Repositories {
    pub users: UserRepoState,
    pub posts: PostRepoState,
    pub communities: CommunityRepoState,
    pub messages: MessageRepoState,
    pub notifications: NotificationRepoState,
    pub reports: ReportRepoState,
    pub tags: TagRepoState,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            posts: Arc::new(PgPostRepository::new(pool.clone())),
            communities: Arc::new(PgCommunityRepository::new(pool.clone())),
            messages: Arc::new(PgMessageRepository::new(pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
            reports: Arc::new(PgReportRepository::new(pool.clone())),
            tags: Arc::new(PgTagRepository::new(pool)),
        }
    }
}
