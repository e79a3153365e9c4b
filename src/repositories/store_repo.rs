use sqlx::PgPool;

use crate::middleware::error_handling::Result;
use crate::models::Store;

#[derive(Clone)]
pub struct StoreRepository {
    pool: PgPool,
}

impl StoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the connected store whose Messenger page matches `page_id`.
    pub async fn find_by_page_id(&self, page_id: &str) -> Result<Option<Store>> {
        let store = sqlx::query_as::<_, Store>(
            "SELECT * FROM stores WHERE page_id = $1 AND connected = TRUE",
        )
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(store)
    }

    /// Find the connected store whose Instagram business account matches
    /// `instagram_id`.
    pub async fn find_by_instagram_id(&self, instagram_id: &str) -> Result<Option<Store>> {
        let store = sqlx::query_as::<_, Store>(
            "SELECT * FROM stores WHERE instagram_id = $1 AND connected = TRUE",
        )
        .bind(instagram_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(store)
    }
}
