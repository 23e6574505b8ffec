#![allow(dead_code)]

//! Shared scaffolding for the handler tests: an in-memory implementation of every
//! repository trait, seeding helpers, and a router wired to mock services.

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{DateTime, Duration, Utc};
use community_api::{
    AppConfig, AppState, MockAuthProvider, MockPushService, MockStorageService, Repositories,
    auth::Claims,
    create_router,
    error::{AppError, AppResult},
    models::*,
    repository::{
        CommunityRepository, MessageRepository, NotificationRepository, PostRepository, ReportRepository,
        TagRepository, UserRepository,
    },
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "super-secure-test-secret-value-local";

// --- In-memory store ---

#[derive(Default)]
pub struct Data {
    pub users: Vec<User>,
    pub posts: Vec<Post>,
    /// (user_id, post_id)
    pub likes: HashSet<(Uuid, Uuid)>,
    pub comments: Vec<Comment>,
    pub communities: Vec<Community>,
    pub memberships: Vec<Membership>,
    pub conversations: Vec<Conversation>,
    pub messages: Vec<Message>,
    /// (recipient, notification)
    pub notifications: Vec<(Uuid, NotificationResponse)>,
    pub subscriptions: Vec<PushSubscription>,
    pub reports: Vec<Report>,
    clock: i64,
    next_comment_id: i64,
}

impl Data {
    /// Strictly increasing timestamps so ordering assertions are deterministic.
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000) + Duration::seconds(self.clock)
    }

    fn username(&self, id: Uuid) -> String {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn hydrate_post(&self, post: &Post) -> Post {
        let mut post = post.clone();
        post.author_username = self.username(post.author_id);
        post.like_count = self.likes.iter().filter(|(_, p)| *p == post.id).count() as i64;
        post.comment_count = self.comments.iter().filter(|c| c.post_id == post.id).count() as i64;
        post
    }

    fn hydrate_community(&self, community: &Community) -> Community {
        let mut community = community.clone();
        community.member_count = self
            .memberships
            .iter()
            .filter(|m| m.community_id == community.id && m.is_active())
            .count() as i64;
        community
    }

    fn member_view(&self, m: &Membership) -> MemberView {
        let user = self.users.iter().find(|u| u.id == m.user_id);
        MemberView {
            community_id: m.community_id,
            community_name: self
                .communities
                .iter()
                .find(|c| c.id == m.community_id)
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            user_id: m.user_id,
            username: user.map(|u| u.username.clone()).unwrap_or_default(),
            display_name: user.and_then(|u| u.display_name.clone()),
            role: m.role,
            status: m.status,
            created_at: m.created_at,
        }
    }

    fn remove_post(&mut self, id: Uuid) {
        self.posts.retain(|p| p.id != id);
        self.likes.retain(|(_, p)| *p != id);
        let removed: Vec<i64> = self.comments.iter().filter(|c| c.post_id == id).map(|c| c.id).collect();
        self.comments.retain(|c| c.post_id != id);
        for report in &mut self.reports {
            if report.post_id == Some(id) {
                report.post_id = None;
            }
            if report.comment_id.is_some_and(|c| removed.contains(&c)) {
                report.comment_id = None;
            }
        }
    }

    fn remove_comment(&mut self, id: i64) {
        self.comments.retain(|c| c.id != id);
        for report in &mut self.reports {
            if report.comment_id == Some(id) {
                report.comment_id = None;
            }
        }
    }
}

fn paginate<T>(items: Vec<T>, page: Pagination) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// InMemoryStore
///
/// Mirrors the semantics of the Postgres repositories closely enough for handler
/// tests: unique constraints become conflicts, compare-and-set updates return `None`.
#[derive(Default)]
pub struct InMemoryStore {
    data: Mutex<Data>,
    fail_take_downs: AtomicBool,
    fail_notifications: AtomicBool,
}

/// What a dropped connection looks like to the handlers.
fn database_down() -> AppError {
    AppError::Database(sqlx::Error::PoolTimedOut)
}

impl InMemoryStore {
    pub fn data(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap()
    }

    /// While set, report take-downs fail as a database error would.
    pub fn fail_take_downs(&self, fail: bool) {
        self.fail_take_downs.store(fail, Ordering::SeqCst);
    }

    /// While set, `create_notification` fails as a database error would.
    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    // --- Seeding ---

    pub fn add_user(&self, username: &str, role: UserRole) -> User {
        let mut data = self.data();
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{username}@example.com"),
            username: username.to_string(),
            role,
            created_at: data.tick(),
            ..User::default()
        };
        data.users.push(user.clone());
        user
    }

    pub fn add_post(&self, author_id: Uuid, status: PostStatus) -> Post {
        self.add_post_with(author_id, status, None, &[])
    }

    pub fn add_post_with(
        &self,
        author_id: Uuid,
        status: PostStatus,
        community_id: Option<Uuid>,
        tags: &[&str],
    ) -> Post {
        let mut data = self.data();
        let now = data.tick();
        let post = Post {
            id: Uuid::new_v4(),
            author_id,
            author_username: data.username(author_id),
            community_id,
            title: "Seeded post".to_string(),
            body: "Seeded body".to_string(),
            status,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: now,
            updated_at: now,
            ..Post::default()
        };
        data.posts.push(post.clone());
        post
    }

    pub fn add_comment(&self, post_id: Uuid, author_id: Uuid) -> Comment {
        let mut data = self.data();
        data.next_comment_id += 1;
        let comment = Comment {
            id: data.next_comment_id,
            post_id,
            author_id,
            author_username: data.username(author_id),
            body: "Seeded comment".to_string(),
            created_at: data.tick(),
        };
        data.comments.push(comment.clone());
        comment
    }

    /// Creates a community with its owner's active membership.
    pub fn add_community(&self, owner_id: Uuid, slug: &str, requires_approval: bool) -> Community {
        let mut data = self.data();
        let now = data.tick();
        let community = Community {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: slug.to_string(),
            owner_id,
            requires_approval,
            created_at: now,
            ..Community::default()
        };
        data.communities.push(community.clone());
        data.memberships.push(Membership {
            community_id: community.id,
            user_id: owner_id,
            role: MemberRole::Owner,
            status: MembershipStatus::Active,
            created_at: now,
            updated_at: now,
        });
        community
    }

    pub fn add_membership(&self, community_id: Uuid, user_id: Uuid, role: MemberRole, status: MembershipStatus) {
        let mut data = self.data();
        let now = data.tick();
        data.memberships.push(Membership { community_id, user_id, role, status, created_at: now, updated_at: now });
    }

    pub fn membership(&self, community_id: Uuid, user_id: Uuid) -> Option<Membership> {
        self.data()
            .memberships
            .iter()
            .find(|m| m.community_id == community_id && m.user_id == user_id)
            .cloned()
    }

    pub fn add_conversation(&self, a: Uuid, b: Uuid) -> Conversation {
        let (user_a, user_b) = conversation_pair(a, b).unwrap();
        let mut data = self.data();
        let now = data.tick();
        let conversation = Conversation { id: Uuid::new_v4(), user_a, user_b, created_at: now, last_message_at: now };
        data.conversations.push(conversation.clone());
        conversation
    }

    pub fn add_report(&self, reporter_id: Uuid, target: ReportTarget) -> Report {
        let mut data = self.data();
        let (post_id, comment_id) = match target {
            ReportTarget::Post { id } => (Some(id), None),
            ReportTarget::Comment { id } => (None, Some(id)),
        };
        let report = Report {
            id: Uuid::new_v4(),
            reporter_id,
            target_type: target.kind(),
            post_id,
            comment_id,
            reason: "spam".to_string(),
            created_at: data.tick(),
            ..Report::default()
        };
        data.reports.push(report.clone());
        report
    }

    pub fn add_subscription(&self, user_id: Uuid, endpoint: &str) -> PushSubscription {
        let mut data = self.data();
        let subscription = PushSubscription {
            id: Uuid::new_v4(),
            user_id,
            endpoint: endpoint.to_string(),
            p256dh: "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM".to_string(),
            auth: "tBHItJI5svbpez7KI4CCXg".to_string(),
            created_at: data.tick(),
        };
        data.subscriptions.push(subscription.clone());
        subscription
    }

    /// Notifications delivered to `user_id`, oldest first.
    pub fn notifications_for(&self, user_id: Uuid) -> Vec<NotificationResponse> {
        self.data()
            .notifications
            .iter()
            .filter(|(recipient, _)| *recipient == user_id)
            .map(|(_, n)| n.clone())
            .collect()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.data().users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut data = self.data();
        if data
            .users
            .iter()
            .any(|u| u.id == user.id || u.email == user.email || u.username == user.username)
        {
            return Err(AppError::conflict("email or username already taken"));
        }
        let created = User {
            id: user.id,
            email: user.email,
            username: user.username,
            display_name: user.display_name,
            role: UserRole::Member,
            created_at: data.tick(),
            ..User::default()
        };
        data.users.push(created.clone());
        Ok(created)
    }

    async fn username_taken(&self, username: &str) -> AppResult<bool> {
        Ok(self.data().users.iter().any(|u| u.username == username))
    }

    async fn update_profile(&self, id: Uuid, changes: UpdateProfileRequest) -> AppResult<Option<User>> {
        let mut data = self.data();
        let Some(user) = data.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = changes.display_name {
            user.display_name = Some(v);
        }
        if let Some(v) = changes.bio {
            user.bio = Some(v);
        }
        if let Some(v) = changes.avatar_url {
            user.avatar_url = Some(v);
        }
        Ok(Some(user.clone()))
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> AppResult<Option<User>> {
        let mut data = self.data();
        Ok(data.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.role = role;
            u.clone()
        }))
    }

    async fn dashboard_stats(&self) -> AppResult<AdminDashboardStats> {
        let data = self.data();
        Ok(AdminDashboardStats {
            total_users: data.users.len() as i64,
            total_posts: data.posts.len() as i64,
            hidden_posts: data.posts.iter().filter(|p| p.status == PostStatus::Hidden).count() as i64,
            total_comments: data.comments.len() as i64,
            total_communities: data.communities.len() as i64,
            open_reports: data.reports.iter().filter(|r| r.status == ReportStatus::Open).count() as i64,
            pending_memberships: data
                .memberships
                .iter()
                .filter(|m| m.status == MembershipStatus::Pending)
                .count() as i64,
        })
    }
}

#[async_trait]
impl PostRepository for InMemoryStore {
    async fn list_posts(&self, query: PostQuery) -> AppResult<Vec<Post>> {
        let data = self.data();
        let mut posts: Vec<Post> = data
            .posts
            .iter()
            .filter(|p| p.status == PostStatus::Published)
            .filter(|p| query.community_id.is_none_or(|c| p.community_id == Some(c)))
            .filter(|p| query.author_id.is_none_or(|a| p.author_id == a))
            .filter(|p| query.tag.as_ref().is_none_or(|t| p.tags.contains(t)))
            .filter(|p| {
                query
                    .search
                    .as_ref()
                    .is_none_or(|s| contains_ci(&p.title, s) || contains_ci(&p.body, s))
            })
            .map(|p| data.hydrate_post(p))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(posts, query.pagination))
    }

    async fn list_all_posts(&self, status: Option<PostStatus>, page: Pagination) -> AppResult<Vec<Post>> {
        let data = self.data();
        let mut posts: Vec<Post> = data
            .posts
            .iter()
            .filter(|p| status.is_none_or(|s| p.status == s))
            .map(|p| data.hydrate_post(p))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(posts, page))
    }

    async fn get_post(&self, id: Uuid) -> AppResult<Option<Post>> {
        let data = self.data();
        Ok(data.posts.iter().find(|p| p.id == id).map(|p| data.hydrate_post(p)))
    }

    async fn create_post(&self, author_id: Uuid, post: NewPost) -> AppResult<Post> {
        let mut data = self.data();
        let now = data.tick();
        let created = Post {
            id: Uuid::new_v4(),
            author_id,
            author_username: data.username(author_id),
            community_id: post.community_id,
            title: post.title,
            body: post.body,
            image_key: post.image_key,
            status: PostStatus::Published,
            tags: post.tags,
            created_at: now,
            updated_at: now,
            ..Post::default()
        };
        data.posts.push(created.clone());
        Ok(created)
    }

    async fn update_post(&self, id: Uuid, author_id: Uuid, changes: UpdatePostRequest) -> AppResult<Option<Post>> {
        let mut data = self.data();
        let now = data.tick();
        let Some(post) = data.posts.iter_mut().find(|p| p.id == id && p.author_id == author_id) else {
            return Ok(None);
        };
        if let Some(v) = changes.title {
            post.title = v;
        }
        if let Some(v) = changes.body {
            post.body = v;
        }
        if let Some(v) = changes.image_key {
            post.image_key = Some(v);
        }
        if let Some(v) = changes.tags {
            post.tags = v;
        }
        post.updated_at = now;
        let post = post.clone();
        Ok(Some(data.hydrate_post(&post)))
    }

    async fn delete_post(&self, id: Uuid, author_id: Uuid) -> AppResult<bool> {
        let mut data = self.data();
        if !data.posts.iter().any(|p| p.id == id && p.author_id == author_id) {
            return Ok(false);
        }
        data.remove_post(id);
        Ok(true)
    }

    async fn delete_post_admin(&self, id: Uuid) -> AppResult<bool> {
        let mut data = self.data();
        if !data.posts.iter().any(|p| p.id == id) {
            return Ok(false);
        }
        data.remove_post(id);
        Ok(true)
    }

    async fn set_post_status(&self, id: Uuid, status: PostStatus) -> AppResult<Option<Post>> {
        let mut data = self.data();
        let updated = data.posts.iter_mut().find(|p| p.id == id).map(|p| {
            p.status = status;
            p.clone()
        });
        Ok(updated.map(|p| data.hydrate_post(&p)))
    }

    async fn like_post(&self, user_id: Uuid, post_id: Uuid) -> AppResult<bool> {
        Ok(self.data().likes.insert((user_id, post_id)))
    }

    async fn unlike_post(&self, user_id: Uuid, post_id: Uuid) -> AppResult<bool> {
        Ok(self.data().likes.remove(&(user_id, post_id)))
    }

    async fn add_comment(&self, post_id: Uuid, author_id: Uuid, body: String) -> AppResult<Comment> {
        let mut data = self.data();
        data.next_comment_id += 1;
        let comment = Comment {
            id: data.next_comment_id,
            post_id,
            author_id,
            author_username: data.username(author_id),
            body,
            created_at: data.tick(),
        };
        data.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, post_id: Uuid) -> AppResult<Vec<Comment>> {
        Ok(self.data().comments.iter().filter(|c| c.post_id == post_id).cloned().collect())
    }

    async fn get_comment(&self, id: i64) -> AppResult<Option<Comment>> {
        Ok(self.data().comments.iter().find(|c| c.id == id).cloned())
    }

    async fn delete_comment(&self, id: i64, author_id: Uuid) -> AppResult<bool> {
        let mut data = self.data();
        if !data.comments.iter().any(|c| c.id == id && c.author_id == author_id) {
            return Ok(false);
        }
        data.remove_comment(id);
        Ok(true)
    }

    async fn delete_comment_admin(&self, id: i64) -> AppResult<bool> {
        let mut data = self.data();
        if !data.comments.iter().any(|c| c.id == id) {
            return Ok(false);
        }
        data.remove_comment(id);
        Ok(true)
    }
}

#[async_trait]
impl CommunityRepository for InMemoryStore {
    async fn list_communities(&self, search: Option<String>, page: Pagination) -> AppResult<Vec<Community>> {
        let data = self.data();
        let mut communities: Vec<Community> = data
            .communities
            .iter()
            .filter(|c| {
                search
                    .as_ref()
                    .is_none_or(|s| contains_ci(&c.name, s) || contains_ci(&c.slug, s))
            })
            .map(|c| data.hydrate_community(c))
            .collect();
        communities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(communities, page))
    }

    async fn get_community(&self, id: Uuid) -> AppResult<Option<Community>> {
        let data = self.data();
        Ok(data.communities.iter().find(|c| c.id == id).map(|c| data.hydrate_community(c)))
    }

    async fn create_community(&self, owner_id: Uuid, community: NewCommunity) -> AppResult<Community> {
        if self.data().communities.iter().any(|c| c.slug == community.slug) {
            return Err(AppError::conflict("slug already taken"));
        }
        let created = self.add_community(owner_id, &community.slug, community.requires_approval);
        let mut data = self.data();
        let stored = data
            .communities
            .iter_mut()
            .find(|c| c.id == created.id)
            .unwrap();
        stored.name = community.name;
        stored.description = community.description;
        let stored = stored.clone();
        Ok(data.hydrate_community(&stored))
    }

    async fn list_user_communities(&self, user_id: Uuid) -> AppResult<Vec<Community>> {
        let data = self.data();
        Ok(data
            .communities
            .iter()
            .filter(|c| {
                data.memberships
                    .iter()
                    .any(|m| m.community_id == c.id && m.user_id == user_id && m.is_active())
            })
            .map(|c| data.hydrate_community(c))
            .collect())
    }

    async fn get_membership(&self, community_id: Uuid, user_id: Uuid) -> AppResult<Option<Membership>> {
        Ok(self.membership(community_id, user_id))
    }

    async fn upsert_membership(
        &self,
        community_id: Uuid,
        user_id: Uuid,
        status: MembershipStatus,
    ) -> AppResult<Option<Membership>> {
        let mut data = self.data();
        let now = data.tick();
        if let Some(existing) = data
            .memberships
            .iter_mut()
            .find(|m| m.community_id == community_id && m.user_id == user_id)
        {
            if existing.status != MembershipStatus::Rejected {
                return Ok(None);
            }
            existing.status = status;
            existing.updated_at = now;
            return Ok(Some(existing.clone()));
        }
        let membership = Membership {
            community_id,
            user_id,
            role: MemberRole::Member,
            status,
            created_at: now,
            updated_at: now,
        };
        data.memberships.push(membership.clone());
        Ok(Some(membership))
    }

    async fn set_membership_status(
        &self,
        community_id: Uuid,
        user_id: Uuid,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> AppResult<Option<Membership>> {
        let mut data = self.data();
        let now = data.tick();
        Ok(data
            .memberships
            .iter_mut()
            .find(|m| m.community_id == community_id && m.user_id == user_id && m.status == from)
            .map(|m| {
                m.status = to;
                m.updated_at = now;
                m.clone()
            }))
    }

    async fn remove_membership(&self, community_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let mut data = self.data();
        let before = data.memberships.len();
        data.memberships.retain(|m| {
            !(m.community_id == community_id && m.user_id == user_id && m.role != MemberRole::Owner)
        });
        Ok(data.memberships.len() < before)
    }

    async fn leave_community(&self, community_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let mut data = self.data();
        let before = data.memberships.len();
        data.memberships.retain(|m| {
            !(m.community_id == community_id
                && m.user_id == user_id
                && m.role != MemberRole::Owner
                && m.status != MembershipStatus::Banned)
        });
        Ok(data.memberships.len() < before)
    }

    async fn list_members(
        &self,
        community_id: Uuid,
        status: Option<MembershipStatus>,
    ) -> AppResult<Vec<MemberView>> {
        let data = self.data();
        Ok(data
            .memberships
            .iter()
            .filter(|m| m.community_id == community_id && status.is_none_or(|s| m.status == s))
            .map(|m| data.member_view(m))
            .collect())
    }

    async fn list_pending_memberships(&self, page: Pagination) -> AppResult<Vec<MemberView>> {
        let data = self.data();
        let pending = data
            .memberships
            .iter()
            .filter(|m| m.status == MembershipStatus::Pending)
            .map(|m| data.member_view(m))
            .collect();
        Ok(paginate(pending, page))
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn find_or_create_conversation(&self, (user_a, user_b): (Uuid, Uuid)) -> AppResult<Conversation> {
        let existing = self
            .data()
            .conversations
            .iter()
            .find(|c| c.user_a == user_a && c.user_b == user_b)
            .cloned();
        Ok(existing.unwrap_or_else(|| self.add_conversation(user_a, user_b)))
    }

    async fn get_conversation(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        Ok(self.data().conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn list_conversations(&self, user_id: Uuid, page: Pagination) -> AppResult<Vec<ConversationSummary>> {
        let data = self.data();
        let mut summaries: Vec<ConversationSummary> = data
            .conversations
            .iter()
            .filter(|c| c.has_participant(user_id))
            .map(|c| {
                let other = c.other_participant(user_id);
                let in_thread: Vec<&Message> = data.messages.iter().filter(|m| m.conversation_id == c.id).collect();
                ConversationSummary {
                    id: c.id,
                    other_user_id: other,
                    other_username: data.username(other),
                    last_message: in_thread.iter().max_by_key(|m| m.created_at).map(|m| m.body.clone()),
                    last_message_at: c.last_message_at,
                    unread_count: in_thread
                        .iter()
                        .filter(|m| m.sender_id != user_id && m.read_at.is_none())
                        .count() as i64,
                }
            })
            .collect();
        summaries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(paginate(summaries, page))
    }

    async fn list_messages(&self, conversation_id: Uuid, page: Pagination) -> AppResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .data()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(messages, page))
    }

    async fn send_message(&self, conversation_id: Uuid, sender_id: Uuid, body: String) -> AppResult<Message> {
        let mut data = self.data();
        let now = data.tick();
        let conversation = data
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or(AppError::NotFound)?;
        conversation.last_message_at = now;
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            body,
            created_at: now,
            read_at: None,
        };
        data.messages.push(message.clone());
        Ok(message)
    }

    async fn mark_conversation_read(&self, conversation_id: Uuid, reader_id: Uuid) -> AppResult<u64> {
        let mut data = self.data();
        let now = data.tick();
        let mut updated = 0;
        for message in data
            .messages
            .iter_mut()
            .filter(|m| m.conversation_id == conversation_id && m.sender_id != reader_id && m.read_at.is_none())
        {
            message.read_at = Some(now);
            updated += 1;
        }
        Ok(updated)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn create_notification(&self, notification: NewNotification) -> AppResult<NotificationResponse> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(database_down());
        }
        let mut data = self.data();
        let created = NotificationResponse {
            id: Uuid::new_v4(),
            kind: notification.kind,
            actor_id: notification.actor_id,
            actor_username: data.username(notification.actor_id),
            post_id: notification.post_id,
            community_id: notification.community_id,
            conversation_id: notification.conversation_id,
            is_read: false,
            created_at: data.tick(),
        };
        data.notifications.push((notification.user_id, created.clone()));
        Ok(created)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: Pagination,
    ) -> AppResult<Vec<NotificationResponse>> {
        let mut notifications: Vec<NotificationResponse> = self
            .notifications_for(user_id)
            .into_iter()
            .filter(|n| !unread_only || !n.is_read)
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(notifications, page))
    }

    async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self.notifications_for(user_id).iter().filter(|n| !n.is_read).count() as i64)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let mut data = self.data();
        Ok(data
            .notifications
            .iter_mut()
            .find(|(recipient, n)| *recipient == user_id && n.id == id)
            .map(|(_, n)| n.is_read = true)
            .is_some())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let mut data = self.data();
        let mut updated = 0;
        for (_, n) in data
            .notifications
            .iter_mut()
            .filter(|(recipient, n)| *recipient == user_id && !n.is_read)
        {
            n.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn save_subscription(&self, user_id: Uuid, subscription: &PushSubscriptionRequest) -> AppResult<Uuid> {
        let mut data = self.data();
        if let Some(existing) = data
            .subscriptions
            .iter_mut()
            .find(|s| s.endpoint == subscription.endpoint)
        {
            existing.user_id = user_id;
            existing.p256dh = subscription.keys.p256dh.clone();
            existing.auth = subscription.keys.auth.clone();
            return Ok(existing.id);
        }
        let id = Uuid::new_v4();
        let created_at = data.tick();
        data.subscriptions.push(PushSubscription {
            id,
            user_id,
            endpoint: subscription.endpoint.clone(),
            p256dh: subscription.keys.p256dh.clone(),
            auth: subscription.keys.auth.clone(),
            created_at,
        });
        Ok(id)
    }

    async fn list_subscriptions(&self, user_id: Uuid) -> AppResult<Vec<PushSubscription>> {
        Ok(self.data().subscriptions.iter().filter(|s| s.user_id == user_id).cloned().collect())
    }

    async fn delete_subscription(&self, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let mut data = self.data();
        let before = data.subscriptions.len();
        data.subscriptions.retain(|s| !(s.id == id && s.user_id == user_id));
        Ok(data.subscriptions.len() < before)
    }

    async fn delete_subscription_by_endpoint(&self, endpoint: &str) -> AppResult<bool> {
        let mut data = self.data();
        let before = data.subscriptions.len();
        data.subscriptions.retain(|s| s.endpoint != endpoint);
        Ok(data.subscriptions.len() < before)
    }
}

#[async_trait]
impl ReportRepository for InMemoryStore {
    async fn create_report(&self, reporter_id: Uuid, target: ReportTarget, reason: String) -> AppResult<Report> {
        let duplicate = self.data().reports.iter().any(|r| {
            r.reporter_id == reporter_id
                && match target {
                    ReportTarget::Post { id } => r.post_id == Some(id),
                    ReportTarget::Comment { id } => r.comment_id == Some(id),
                }
        });
        if duplicate {
            return Err(AppError::conflict("you have already reported this content"));
        }
        let mut report = self.add_report(reporter_id, target);
        report.reason = reason;
        let mut data = self.data();
        if let Some(stored) = data.reports.iter_mut().find(|r| r.id == report.id) {
            stored.reason = report.reason.clone();
        }
        Ok(report)
    }

    async fn list_reports(&self, status: Option<ReportStatus>, page: Pagination) -> AppResult<Vec<Report>> {
        let reports = self
            .data()
            .reports
            .iter()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        Ok(paginate(reports, page))
    }

    async fn get_report(&self, id: Uuid) -> AppResult<Option<Report>> {
        Ok(self.data().reports.iter().find(|r| r.id == id).cloned())
    }

    async fn resolve_report(
        &self,
        id: Uuid,
        resolver_id: Uuid,
        resolution: &Resolution,
    ) -> AppResult<Option<ClosedReport>> {
        let mut data = self.data();
        let Some(index) = data.reports.iter().position(|r| r.id == id && r.status == ReportStatus::Open) else {
            return Ok(None);
        };
        // Nothing is written unless the take-down goes through too.
        if resolution.take_down && self.fail_take_downs.load(Ordering::SeqCst) {
            return Err(database_down());
        }

        let now = data.tick();
        let report = {
            let r = &mut data.reports[index];
            r.status = resolution.status;
            r.resolved_by = Some(resolver_id);
            r.resolution_note = resolution.note.clone();
            r.resolved_at = Some(now);
            r.clone()
        };

        let mut hidden_post_author = None;
        if resolution.take_down {
            if let Some(post_id) = report.post_id {
                if let Some(post) = data
                    .posts
                    .iter_mut()
                    .find(|p| p.id == post_id && p.status != PostStatus::Hidden)
                {
                    post.status = PostStatus::Hidden;
                    hidden_post_author = Some(post.author_id);
                }
            } else if let Some(comment_id) = report.comment_id {
                data.remove_comment(comment_id);
            }
        }
        Ok(Some(ClosedReport { report, hidden_post_author }))
    }
}

#[async_trait]
impl TagRepository for InMemoryStore {
    async fn list_tags(&self, prefix: Option<String>, limit: i64) -> AppResult<Vec<TagCount>> {
        let data = self.data();
        let mut counts: Vec<TagCount> = Vec::new();
        for post in data.posts.iter().filter(|p| p.status == PostStatus::Published) {
            for tag in &post.tags {
                if prefix.as_ref().is_some_and(|p| !tag.starts_with(p.as_str())) {
                    continue;
                }
                match counts.iter_mut().find(|c| &c.name == tag) {
                    Some(count) => count.post_count += 1,
                    None => counts.push(TagCount { name: tag.clone(), post_count: 1 }),
                }
            }
        }
        counts.sort_by(|a, b| b.post_count.cmp(&a.post_count).then_with(|| a.name.cmp(&b.name)));
        counts.truncate(limit as usize);
        Ok(counts)
    }
}

// --- Application under test ---

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub push: Arc<MockPushService>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(MockStorageService::new(), MockPushService::default(), AppConfig::default())
    }

    pub fn with_push(push: MockPushService) -> Self {
        Self::build(MockStorageService::new(), push, AppConfig::default())
    }

    pub fn with_storage(storage: MockStorageService) -> Self {
        Self::build(storage, MockPushService::default(), AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::build(MockStorageService::new(), MockPushService::default(), config)
    }

    pub fn build(storage: MockStorageService, push: MockPushService, config: AppConfig) -> Self {
        let store = Arc::new(InMemoryStore::default());
        let push = Arc::new(push);
        let repos = Repositories {
            users: store.clone(),
            posts: store.clone(),
            communities: store.clone(),
            messages: store.clone(),
            notifications: store.clone(),
            reports: store.clone(),
            tags: store.clone(),
        };
        let state = AppState {
            repos,
            storage: Arc::new(storage),
            push: push.clone(),
            auth_provider: Arc::new(MockAuthProvider::new(Uuid::new_v4())),
            config,
        };
        Self { store, push, state }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Sends one request through the full router. `as_user` authenticates through the
    /// local `x-user-id` bypass. Empty bodies come back as `Value::Null`.
    pub async fn call(&self, method: &str, uri: &str, as_user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(id) = as_user {
            request = request.header("x-user-id", id.to_string());
        }
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self.router().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

// --- Tokens ---

fn now_secs() -> usize {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as usize
}

/// Signs an access token the way the hosted auth provider does (HS256).
pub fn token_for(user_id: Uuid, secret: &str, audience: &str, ttl_secs: i64) -> String {
    let now = now_secs();
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: (now as i64 + ttl_secs) as usize,
        aud: audience.to_string(),
        email: None,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

pub fn valid_token(user_id: Uuid) -> String {
    token_for(user_id, TEST_JWT_SECRET, "authenticated", 3600)
}
