use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppResult, conflict_on_unique},
    models::{AdminDashboardStats, NewUser, UpdateProfileRequest, User, UserRole},
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    /// Creates the profile mirroring a freshly signed-up auth user.
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn username_taken(&self, username: &str) -> AppResult<bool>;
    async fn update_profile(&self, id: Uuid, changes: UpdateProfileRequest) -> AppResult<Option<User>>;
    async fn set_role(&self, id: Uuid, role: UserRole) -> AppResult<Option<User>>;
    async fn dashboard_stats(&self) -> AppResult<AdminDashboardStats>;
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, email, username, display_name, bio, avatar_url, role, created_at";

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM profiles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO profiles (id, email, username, display_name, role) \
             VALUES ($1, $2, $3, $4, 'member') RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email or username already taken"))
    }

    async fn username_taken(&self, username: &str) -> AppResult<bool> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM profiles WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(taken)
    }

    /// COALESCE keeps columns whose field is `None`.
    async fn update_profile(&self, id: Uuid, changes: UpdateProfileRequest) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE profiles SET \
                display_name = COALESCE($2, display_name), \
                bio = COALESCE($3, bio), \
                avatar_url = COALESCE($4, avatar_url) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.display_name)
        .bind(changes.bio)
        .bind(changes.avatar_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE profiles SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn dashboard_stats(&self) -> AppResult<AdminDashboardStats> {
        let stats = sqlx::query_as::<_, AdminDashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM profiles) AS total_users,
                (SELECT COUNT(*) FROM posts) AS total_posts,
                (SELECT COUNT(*) FROM posts WHERE status = 'hidden') AS hidden_posts,
                (SELECT COUNT(*) FROM comments) AS total_comments,
                (SELECT COUNT(*) FROM communities) AS total_communities,
                (SELECT COUNT(*) FROM reports WHERE status = 'open') AS open_reports,
                (SELECT COUNT(*) FROM community_members WHERE status = 'pending') AS pending_memberships
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
