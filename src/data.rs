use sqlx::{Row, SqlitePool};

/// A SQLite table keyed by a text `id` column.
#[async_trait::async_trait]
pub trait Table {
    type Record<'a>;
    type Row: Send;

    fn get_name(&self) -> &str;
    fn get_pool(&self) -> &SqlitePool;

    async fn create(&self) -> Result<(), sqlx::Error>;
    async fn insert<'a>(&self, record: Self::Record<'a>) -> Result<(), sqlx::Error>;
    async fn all(&self) -> Result<Vec<Self::Row>, sqlx::Error>;

    async fn contains(&self, id: &str) -> Result<bool, sqlx::Error> {
        let query = format!("SELECT id FROM {} WHERE id = ?", self.get_name());
        Ok(sqlx::query(&query)
            .bind(id.trim())
            .fetch_optional(self.get_pool())
            .await?
            .is_some())
    }

    async fn count(&self) -> Result<u32, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM {}", self.get_name());
        Ok(sqlx::query(&query)
            .fetch_one(self.get_pool())
            .await?
            .try_get(0)?)
    }
}
