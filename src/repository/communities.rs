use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, conflict_on_unique},
    models::{Community, MemberView, Membership, MembershipStatus, NewCommunity, Pagination},
};

#[async_trait]
pub trait CommunityRepository: Send + Sync {
    async fn list_communities(&self, search: Option<String>, page: Pagination) -> AppResult<Vec<Community>>;
    async fn get_community(&self, id: Uuid) -> AppResult<Option<Community>>;
    /// Creates the community and its owner's active membership atomically.
    async fn create_community(&self, owner_id: Uuid, community: NewCommunity) -> AppResult<Community>;
    /// Communities where the user is an active member.
    async fn list_user_communities(&self, user_id: Uuid) -> AppResult<Vec<Community>>;

    // --- Membership workflow ---
    async fn get_membership(&self, community_id: Uuid, user_id: Uuid) -> AppResult<Option<Membership>>;
    /// Inserts a `member` row with `status`, or re-opens a rejected one. `None` when a
    /// non-rejected row appeared concurrently.
    async fn upsert_membership(
        &self,
        community_id: Uuid,
        user_id: Uuid,
        status: MembershipStatus,
    ) -> AppResult<Option<Membership>>;
    /// Compare-and-set on the status; `None` when the row is no longer in `from`.
    async fn set_membership_status(
        &self,
        community_id: Uuid,
        user_id: Uuid,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> AppResult<Option<Membership>>;
    /// Never removes the owner row.
    async fn remove_membership(&self, community_id: Uuid, user_id: Uuid) -> AppResult<bool>;
    /// Self-service removal. Leaves owner and banned rows in place.
    async fn leave_community(&self, community_id: Uuid, user_id: Uuid) -> AppResult<bool>;
    async fn list_members(
        &self,
        community_id: Uuid,
        status: Option<MembershipStatus>,
    ) -> AppResult<Vec<MemberView>>;
    /// The approval queue across every community.
    async fn list_pending_memberships(&self, page: Pagination) -> AppResult<Vec<MemberView>>;
}

pub struct PgCommunityRepository {
    pool: PgPool,
}

impl PgCommunityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COMMUNITY_SELECT: &str = r#"
    SELECT
        c.id, c.slug, c.name, c.description, c.owner_id, c.requires_approval,
        (SELECT COUNT(*) FROM community_members m
          WHERE m.community_id = c.id AND m.status = 'active') AS member_count,
        c.created_at
    FROM communities c
"#;

const MEMBER_SELECT: &str = r#"
    SELECT
        m.community_id, c.name AS community_name, m.user_id, pr.username, pr.display_name,
        m.role, m.status, m.created_at
    FROM community_members m
    JOIN communities c ON c.id = m.community_id
    JOIN profiles pr ON pr.id = m.user_id
"#;

const MEMBERSHIP_COLUMNS: &str = "community_id, user_id, role, status, created_at, updated_at";

async fn fetch_community<'e, E>(executor: E, id: Uuid) -> AppResult<Option<Community>>
where
    E: Executor<'e, Database = Postgres>,
{
    let community = sqlx::query_as::<_, Community>(&format!("{COMMUNITY_SELECT} WHERE c.id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(community)
}

#[async_trait]
impl CommunityRepository for PgCommunityRepository {
    async fn list_communities(&self, search: Option<String>, page: Pagination) -> AppResult<Vec<Community>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(COMMUNITY_SELECT);
        if let Some(search) = search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            let pattern = format!("%{search}%");
            builder
                .push(" WHERE (c.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.slug ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        builder
            .push(" ORDER BY c.name ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let communities = builder.build_query_as::<Community>().fetch_all(&self.pool).await?;
        Ok(communities)
    }

    async fn get_community(&self, id: Uuid) -> AppResult<Option<Community>> {
        fetch_community(&self.pool, id).await
    }

    async fn create_community(&self, owner_id: Uuid, community: NewCommunity) -> AppResult<Community> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO communities (id, slug, name, description, owner_id, requires_approval) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(&community.slug)
        .bind(&community.name)
        .bind(&community.description)
        .bind(owner_id)
        .bind(community.requires_approval)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "community slug already taken"))?;

        sqlx::query(
            "INSERT INTO community_members (community_id, user_id, role, status) \
             VALUES ($1, $2, 'owner', 'active')",
        )
        .bind(id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        let created = fetch_community(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::Internal("inserted community vanished".into()))?;
        tx.commit().await?;
        Ok(created)
    }

    async fn list_user_communities(&self, user_id: Uuid) -> AppResult<Vec<Community>> {
        let communities = sqlx::query_as::<_, Community>(&format!(
            "{COMMUNITY_SELECT} \
             JOIN community_members me ON me.community_id = c.id \
             WHERE me.user_id = $1 AND me.status = 'active' \
             ORDER BY c.name ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(communities)
    }

    async fn get_membership(&self, community_id: Uuid, user_id: Uuid) -> AppResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM community_members WHERE community_id = $1 AND user_id = $2"
        ))
        .bind(community_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    async fn upsert_membership(
        &self,
        community_id: Uuid,
        user_id: Uuid,
        status: MembershipStatus,
    ) -> AppResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(&format!(
            "INSERT INTO community_members (community_id, user_id, role, status) \
             VALUES ($1, $2, 'member', $3) \
             ON CONFLICT (community_id, user_id) DO UPDATE \
                SET status = EXCLUDED.status, updated_at = NOW() \
                WHERE community_members.status = 'rejected' \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(community_id)
        .bind(user_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    async fn set_membership_status(
        &self,
        community_id: Uuid,
        user_id: Uuid,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> AppResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(&format!(
            "UPDATE community_members SET status = $4, updated_at = NOW() \
             WHERE community_id = $1 AND user_id = $2 AND status = $3 \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(community_id)
        .bind(user_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    async fn remove_membership(&self, community_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let res = sqlx::query(
            "DELETE FROM community_members WHERE community_id = $1 AND user_id = $2 AND role <> 'owner'",
        )
        .bind(community_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn leave_community(&self, community_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let res = sqlx::query(
            r#"
            DELETE FROM community_members
            WHERE community_id = $1 AND user_id = $2 AND role <> 'owner' AND status <> 'banned'
            "#,
        )
        .bind(community_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_members(
        &self,
        community_id: Uuid,
        status: Option<MembershipStatus>,
    ) -> AppResult<Vec<MemberView>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(MEMBER_SELECT);
        builder.push(" WHERE m.community_id = ").push_bind(community_id);
        if let Some(status) = status {
            builder.push(" AND m.status = ").push_bind(status.as_str());
        }
        builder.push(" ORDER BY m.created_at ASC");

        let members = builder.build_query_as::<MemberView>().fetch_all(&self.pool).await?;
        Ok(members)
    }

    async fn list_pending_memberships(&self, page: Pagination) -> AppResult<Vec<MemberView>> {
        let members = sqlx::query_as::<_, MemberView>(&format!(
            "{MEMBER_SELECT} WHERE m.status = 'pending' ORDER BY m.created_at ASC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }
}
