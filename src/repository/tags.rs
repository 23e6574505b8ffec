use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{error::AppResult, models::TagCount};

#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Tags ordered by how many published posts carry them.
    async fn list_tags(&self, prefix: Option<String>, limit: i64) -> AppResult<Vec<TagCount>>;
}

pub struct PgTagRepository {
    pool: PgPool,
}

impl PgTagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn list_tags(&self, prefix: Option<String>, limit: i64) -> AppResult<Vec<TagCount>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT t.name, COUNT(p.id) AS post_count \
             FROM tags t \
             LEFT JOIN post_tags pt ON pt.tag_id = t.id \
             LEFT JOIN posts p ON p.id = pt.post_id AND p.status = 'published'",
        );
        if let Some(prefix) = prefix {
            // Tag names are [a-z0-9-], so LIKE wildcards cannot appear in a normalised prefix.
            builder.push(" WHERE t.name LIKE ").push_bind(format!("{prefix}%"));
        }
        builder
            .push(" GROUP BY t.name ORDER BY post_count DESC, t.name ASC LIMIT ")
            .push_bind(limit);

        let tags = builder.build_query_as::<TagCount>().fetch_all(&self.pool).await?;
        Ok(tags)
    }
}
