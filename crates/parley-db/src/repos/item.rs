//! Item catalog repository
//!
//! The catalog is external and read-only to the engine; this repository only
//! ever looks items up by id.

use sqlx::PgPool;

use crate::{DbItem, DbResult};

pub struct ItemRepo {
    pool: PgPool,
}

impl ItemRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<DbItem>> {
        let item = sqlx::query_as::<_, DbItem>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }
}
