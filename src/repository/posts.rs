use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Comment, NewPost, Pagination, Post, PostQuery, PostStatus, UpdatePostRequest},
};

#[async_trait]
pub trait PostRepository: Send + Sync {
    // --- Retrieval ---
    /// Published posts matching the query, newest first.
    async fn list_posts(&self, query: PostQuery) -> AppResult<Vec<Post>>;
    /// Moderation listing: every status unless one is given.
    async fn list_all_posts(&self, status: Option<PostStatus>, page: Pagination) -> AppResult<Vec<Post>>;
    /// Any post by id regardless of status; visibility is the caller's decision.
    async fn get_post(&self, id: Uuid) -> AppResult<Option<Post>>;

    // --- Author actions ---
    async fn create_post(&self, author_id: Uuid, post: NewPost) -> AppResult<Post>;
    /// Author-only; `None` when the post does not exist or belongs to someone else.
    async fn update_post(&self, id: Uuid, author_id: Uuid, changes: UpdatePostRequest) -> AppResult<Option<Post>>;
    async fn delete_post(&self, id: Uuid, author_id: Uuid) -> AppResult<bool>;

    // --- Moderation ---
    async fn delete_post_admin(&self, id: Uuid) -> AppResult<bool>;
    async fn set_post_status(&self, id: Uuid, status: PostStatus) -> AppResult<Option<Post>>;

    // --- Likes ---
    /// `false` when the like already existed.
    async fn like_post(&self, user_id: Uuid, post_id: Uuid) -> AppResult<bool>;
    /// `false` when there was nothing to remove.
    async fn unlike_post(&self, user_id: Uuid, post_id: Uuid) -> AppResult<bool>;

    // --- Comments ---
    async fn add_comment(&self, post_id: Uuid, author_id: Uuid, body: String) -> AppResult<Comment>;
    async fn list_comments(&self, post_id: Uuid) -> AppResult<Vec<Comment>>;
    async fn get_comment(&self, id: i64) -> AppResult<Option<Comment>>;
    async fn delete_comment(&self, id: i64, author_id: Uuid) -> AppResult<bool>;
    async fn delete_comment_admin(&self, id: i64) -> AppResult<bool>;
}

pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Post columns with author, counters and tags resolved. Expects `WHERE`/`ORDER` to follow.
const POST_SELECT: &str = r#"
    SELECT
        p.id, p.author_id, pr.username AS author_username, p.community_id,
        p.title, p.body, p.image_key, p.status,
        (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS like_count,
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count,
        COALESCE(
            (SELECT array_agg(t.name ORDER BY t.name)
               FROM post_tags pt JOIN tags t ON t.id = pt.tag_id
              WHERE pt.post_id = p.id),
            '{}'::text[]
        ) AS tags,
        p.created_at, p.updated_at
    FROM posts p
    JOIN profiles pr ON pr.id = p.author_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.author_id, pr.username AS author_username, c.body, c.created_at
    FROM comments c
    JOIN profiles pr ON pr.id = c.author_id
"#;

async fn fetch_post<'e, E>(executor: E, id: Uuid) -> AppResult<Option<Post>>
where
    E: Executor<'e, Database = Postgres>,
{
    let post = sqlx::query_as::<_, Post>(&format!("{POST_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(post)
}

/// Creates missing tags and links all of them to the post.
async fn attach_tags(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    post_id: Uuid,
    tags: &[String],
) -> AppResult<()> {
    if tags.is_empty() {
        return Ok(());
    }
    sqlx::query("INSERT INTO tags (name) SELECT UNNEST($1::text[]) ON CONFLICT (name) DO NOTHING")
        .bind(tags)
        .execute(&mut **tx)
        .await?;
    sqlx::query(
        "INSERT INTO post_tags (post_id, tag_id) SELECT $1, id FROM tags WHERE name = ANY($2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(post_id)
    .bind(tags)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl PostRepository for PgPostRepository {
    /// Filters are appended with `QueryBuilder` so every user value is a bound parameter.
    async fn list_posts(&self, query: PostQuery) -> AppResult<Vec<Post>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(POST_SELECT);
        builder.push(" WHERE p.status = 'published'");

        if let Some(community_id) = query.community_id {
            builder.push(" AND p.community_id = ").push_bind(community_id);
        }
        if let Some(author_id) = query.author_id {
            builder.push(" AND p.author_id = ").push_bind(author_id);
        }
        if let Some(tag) = query.tag {
            builder
                .push(" AND EXISTS (SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id WHERE pt.post_id = p.id AND t.name = ")
                .push_bind(tag)
                .push(")");
        }
        if let Some(search) = query.search {
            let pattern = format!("%{search}%");
            builder
                .push(" AND (p.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.body ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        builder
            .push(" ORDER BY p.created_at DESC LIMIT ")
            .push_bind(query.pagination.limit())
            .push(" OFFSET ")
            .push_bind(query.pagination.offset());

        let posts = builder.build_query_as::<Post>().fetch_all(&self.pool).await?;
        Ok(posts)
    }

    async fn list_all_posts(&self, status: Option<PostStatus>, page: Pagination) -> AppResult<Vec<Post>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(POST_SELECT);
        if let Some(status) = status {
            builder.push(" WHERE p.status = ").push_bind(status.as_str());
        }
        builder
            .push(" ORDER BY p.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let posts = builder.build_query_as::<Post>().fetch_all(&self.pool).await?;
        Ok(posts)
    }

    async fn get_post(&self, id: Uuid) -> AppResult<Option<Post>> {
        fetch_post(&self.pool, id).await
    }

    async fn create_post(&self, author_id: Uuid, post: NewPost) -> AppResult<Post> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO posts (id, author_id, community_id, title, body, image_key, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'published', NOW(), NOW())",
        )
        .bind(id)
        .bind(author_id)
        .bind(post.community_id)
        .bind(&post.title)
        .bind(&post.body)
        .bind(&post.image_key)
        .execute(&mut *tx)
        .await?;

        attach_tags(&mut tx, id, &post.tags).await?;

        let created = fetch_post(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::Internal("inserted post vanished".into()))?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_post(&self, id: Uuid, author_id: Uuid, changes: UpdatePostRequest) -> AppResult<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE posts SET \
                title = COALESCE($3, title), \
                body = COALESCE($4, body), \
                image_key = COALESCE($5, image_key), \
                updated_at = NOW() \
             WHERE id = $1 AND author_id = $2",
        )
        .bind(id)
        .bind(author_id)
        .bind(changes.title)
        .bind(changes.body)
        .bind(changes.image_key)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(tags) = changes.tags {
            sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            attach_tags(&mut tx, id, &tags).await?;
        }

        let post = fetch_post(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid, author_id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_post_admin(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_post_status(&self, id: Uuid, status: PostStatus) -> AppResult<Option<Post>> {
        let res = sqlx::query("UPDATE posts SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Ok(None);
        }
        fetch_post(&self.pool, id).await
    }

    /// `ON CONFLICT DO NOTHING` on the (user, post) key makes repeated likes a no-op.
    async fn like_post(&self, user_id: Uuid, post_id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn unlike_post(&self, user_id: Uuid, post_id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn add_comment(&self, post_id: Uuid, author_id: Uuid, body: String) -> AppResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (post_id, author_id, body) VALUES ($1, $2, $3)
                RETURNING id, post_id, author_id, body, created_at
            )
            SELECT i.id, i.post_id, i.author_id, pr.username AS author_username, i.body, i.created_at
            FROM inserted i JOIN profiles pr ON pr.id = i.author_id
            "#,
        )
        .bind(post_id)
        .bind(author_id)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn list_comments(&self, post_id: Uuid) -> AppResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "{COMMENT_SELECT} WHERE c.post_id = $1 ORDER BY c.created_at ASC, c.id ASC"
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn get_comment(&self, id: i64) -> AppResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: i64, author_id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_comment_admin(&self, id: i64) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
