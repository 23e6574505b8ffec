//! Postgres-backed repository tests. They need a disposable database:
//!
//! DATABASE_URL=postgres://... cargo test --test repository_integration_tests -- --ignored

use community_api::{
    error::AppError,
    models::{
        MembershipStatus, NewCommunity, NewNotification, NewPost, NewUser, NotificationKind, Pagination, Post,
        PostQuery, PostStatus, ReportStatus, ReportTarget, Resolution, UpdatePostRequest, User, conversation_pair,
    },
    repository::Repositories,
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    repos: Repositories,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set to run integration tests");
        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { repos: Repositories::postgres(pool) }
    }

    /// Usernames are unique per run so tests can share one database.
    async fn user(&self, prefix: &str) -> User {
        let id = Uuid::new_v4();
        let suffix = &id.simple().to_string()[..12];
        self.repos
            .users
            .create_user(NewUser {
                id,
                email: format!("{prefix}-{suffix}@test.com"),
                username: format!("{prefix}_{suffix}"),
                display_name: None,
            })
            .await
            .expect("create user")
    }

    async fn post(&self, author: &User, tags: &[&str]) -> Post {
        self.repos
            .posts
            .create_post(
                author.id,
                NewPost {
                    title: "Integration".to_string(),
                    body: "Body".to_string(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    ..NewPost::default()
                },
            )
            .await
            .expect("create post")
    }
}

// --- Users ---

#[tokio::test]
#[ignore]
async fn test_duplicate_username_is_conflict() {
    let ctx = DbTestContext::setup().await;
    let user = ctx.user("dup").await;

    let result = ctx
        .repos
        .users
        .create_user(NewUser {
            id: Uuid::new_v4(),
            email: format!("other-{}@test.com", Uuid::new_v4()),
            username: user.username.clone(),
            display_name: None,
        })
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

// --- Posts ---

#[tokio::test]
#[ignore]
async fn test_post_lifecycle() {
    let ctx = DbTestContext::setup().await;
    let author = ctx.user("author").await;
    let other = ctx.user("other").await;
    let tag = format!("it-{}", &Uuid::new_v4().simple().to_string()[..8]);
    let post = ctx.post(&author, &[&tag]).await;

    assert_eq!(post.status, PostStatus::Published);
    assert_eq!(post.tags, vec![tag.clone()]);
    assert_eq!(post.author_username, author.username);

    let listed = ctx
        .repos
        .posts
        .list_posts(PostQuery { tag: Some(tag.clone()), ..PostQuery::default() })
        .await
        .unwrap();
    assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![post.id]);

    // Only the author edits.
    let changes = UpdatePostRequest { title: Some("Edited".to_string()), ..UpdatePostRequest::default() };
    assert!(ctx.repos.posts.update_post(post.id, other.id, changes.clone()).await.unwrap().is_none());
    let edited = ctx.repos.posts.update_post(post.id, author.id, changes).await.unwrap().unwrap();
    assert_eq!(edited.title, "Edited");

    assert!(ctx.repos.posts.like_post(other.id, post.id).await.unwrap());
    assert!(!ctx.repos.posts.like_post(other.id, post.id).await.unwrap());
    assert_eq!(ctx.repos.posts.get_post(post.id).await.unwrap().unwrap().like_count, 1);
    assert!(ctx.repos.posts.unlike_post(other.id, post.id).await.unwrap());
    assert!(!ctx.repos.posts.unlike_post(other.id, post.id).await.unwrap());

    // Hidden posts drop out of listings and tag counts.
    ctx.repos.posts.set_post_status(post.id, PostStatus::Hidden).await.unwrap();
    let tags = ctx.repos.tags.list_tags(Some(tag.clone()), 10).await.unwrap();
    assert!(tags.is_empty());

    assert!(!ctx.repos.posts.delete_post(post.id, other.id).await.unwrap());
    assert!(ctx.repos.posts.delete_post(post.id, author.id).await.unwrap());
    assert!(ctx.repos.posts.get_post(post.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_comments_and_report_of_deleted_comment() {
    let ctx = DbTestContext::setup().await;
    let author = ctx.user("author").await;
    let reporter = ctx.user("reporter").await;
    let admin = ctx.user("admin").await;
    let post = ctx.post(&author, &[]).await;

    let comment = ctx
        .repos
        .posts
        .add_comment(post.id, author.id, "first".to_string())
        .await
        .unwrap();
    assert_eq!(ctx.repos.posts.list_comments(post.id).await.unwrap().len(), 1);

    let report = ctx
        .repos
        .reports
        .create_report(reporter.id, ReportTarget::Comment { id: comment.id }, "rude".to_string())
        .await
        .unwrap();
    let repeat = ctx
        .repos
        .reports
        .create_report(reporter.id, ReportTarget::Comment { id: comment.id }, "again".to_string())
        .await;
    assert!(matches!(repeat, Err(AppError::Conflict(_))));

    // The report outlives the comment it points at.
    assert!(ctx.repos.posts.delete_comment_admin(comment.id).await.unwrap());
    let orphan = ctx.repos.reports.get_report(report.id).await.unwrap().unwrap();
    assert_eq!(orphan.comment_id, None);

    let resolution = Resolution { status: ReportStatus::Dismissed, note: None, take_down: false };
    let closed = ctx
        .repos
        .reports
        .resolve_report(report.id, admin.id, &resolution)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(closed.report.status, ReportStatus::Dismissed);
    assert!(ctx.repos.reports.resolve_report(report.id, admin.id, &resolution).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_resolve_report_takes_post_down_in_one_step() {
    let ctx = DbTestContext::setup().await;
    let author = ctx.user("author").await;
    let reporter = ctx.user("reporter").await;
    let admin = ctx.user("admin").await;
    let post = ctx.post(&author, &[]).await;

    let report = ctx
        .repos
        .reports
        .create_report(reporter.id, ReportTarget::Post { id: post.id }, "spam".to_string())
        .await
        .unwrap();
    let resolution = Resolution { status: ReportStatus::Resolved, note: None, take_down: true };
    let closed = ctx
        .repos
        .reports
        .resolve_report(report.id, admin.id, &resolution)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(closed.report.status, ReportStatus::Resolved);
    assert_eq!(closed.hidden_post_author, Some(author.id));
    let stored = ctx.repos.posts.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Hidden);
}

// --- Communities ---

#[tokio::test]
#[ignore]
async fn test_membership_workflow() {
    let ctx = DbTestContext::setup().await;
    let owner = ctx.user("owner").await;
    let applicant = ctx.user("applicant").await;
    let slug = format!("club-{}", &Uuid::new_v4().simple().to_string()[..8]);

    let community = ctx
        .repos
        .communities
        .create_community(
            owner.id,
            NewCommunity { slug: slug.clone(), name: "Club".to_string(), requires_approval: true, ..NewCommunity::default() },
        )
        .await
        .unwrap();
    assert_eq!(community.member_count, 1);

    let duplicate = ctx
        .repos
        .communities
        .create_community(owner.id, NewCommunity { slug, name: "Again".to_string(), ..NewCommunity::default() })
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let pending = ctx
        .repos
        .communities
        .upsert_membership(community.id, applicant.id, MembershipStatus::Pending)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.status, MembershipStatus::Pending);

    let rejected = ctx
        .repos
        .communities
        .set_membership_status(community.id, applicant.id, MembershipStatus::Pending, MembershipStatus::Rejected)
        .await
        .unwrap();
    assert!(rejected.is_some());
    // A second transition from the same state loses the race.
    let stale = ctx
        .repos
        .communities
        .set_membership_status(community.id, applicant.id, MembershipStatus::Pending, MembershipStatus::Active)
        .await
        .unwrap();
    assert!(stale.is_none());

    // Rejected applicants may apply again.
    let reopened = ctx
        .repos
        .communities
        .upsert_membership(community.id, applicant.id, MembershipStatus::Pending)
        .await
        .unwrap();
    assert_eq!(reopened.map(|m| m.status), Some(MembershipStatus::Pending));

    // A banned member's row survives a self-service leave.
    ctx.repos
        .communities
        .set_membership_status(community.id, applicant.id, MembershipStatus::Pending, MembershipStatus::Banned)
        .await
        .unwrap();
    assert!(!ctx.repos.communities.leave_community(community.id, applicant.id).await.unwrap());
    assert!(!ctx.repos.communities.leave_community(community.id, owner.id).await.unwrap());

    assert!(!ctx.repos.communities.remove_membership(community.id, owner.id).await.unwrap());
    assert!(ctx.repos.communities.remove_membership(community.id, applicant.id).await.unwrap());
}

// --- Messages ---

#[tokio::test]
#[ignore]
async fn test_conversation_is_unique_per_pair() {
    let ctx = DbTestContext::setup().await;
    let alice = ctx.user("alice").await;
    let bob = ctx.user("bob").await;
    let pair = conversation_pair(alice.id, bob.id).unwrap();

    let first = ctx.repos.messages.find_or_create_conversation(pair).await.unwrap();
    let second = ctx.repos.messages.find_or_create_conversation(pair).await.unwrap();
    assert_eq!(first.id, second.id);

    ctx.repos
        .messages
        .send_message(first.id, alice.id, "hello".to_string())
        .await
        .unwrap();
    let inbox = ctx.repos.messages.list_conversations(bob.id, Pagination::default()).await.unwrap();
    let entry = inbox.iter().find(|c| c.id == first.id).unwrap();
    assert_eq!(entry.unread_count, 1);

    assert_eq!(ctx.repos.messages.mark_conversation_read(first.id, alice.id).await.unwrap(), 0);
    assert_eq!(ctx.repos.messages.mark_conversation_read(first.id, bob.id).await.unwrap(), 1);
}

// --- Notifications ---

#[tokio::test]
#[ignore]
async fn test_notifications_are_recipient_scoped() {
    let ctx = DbTestContext::setup().await;
    let author = ctx.user("author").await;
    let fan = ctx.user("fan").await;
    let post = ctx.post(&author, &[]).await;

    let created = ctx
        .repos
        .notifications
        .create_notification(NewNotification::about_post(NotificationKind::PostLiked, author.id, fan.id, post.id))
        .await
        .unwrap();
    assert_eq!(created.actor_username, fan.username);
    assert_eq!(ctx.repos.notifications.unread_count(author.id).await.unwrap(), 1);

    assert!(!ctx.repos.notifications.mark_read(created.id, fan.id).await.unwrap());
    assert!(ctx.repos.notifications.mark_read(created.id, author.id).await.unwrap());
    assert_eq!(ctx.repos.notifications.unread_count(author.id).await.unwrap(), 0);
}
