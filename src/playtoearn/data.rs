use crate::{record::GameRecord, utils, CrawlerError, Sink, Table};
use futures::TryStreamExt;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};

pub struct GameTable {
    name: String,
    pool: SqlitePool,
}

#[async_trait::async_trait]
impl Table for GameTable {
    type Record<'a> = &'a GameRecord;
    type Row = GameRecord;

    fn get_name(&self) -> &str {
        self.name.as_str()
    }

    fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create(&self) -> Result<(), sqlx::Error> {
        if !utils::is_table_exists(self.get_pool(), &self.name).await? {
            let query = format!(
                r#"
                        CREATE TABLE {} (
                            id TEXT PRIMARY KEY,
                            created_at DATETIME,
                            description TEXT,
                            category TEXT,
                            blockchain TEXT,
                            device TEXT,
                            status TEXT,
                            nft TEXT,
                            f2p TEXT,
                            p2e TEXT,
                            p2e_score TEXT
                        )
                    "#,
                &self.name
            );
            sqlx::query(query.as_str()).execute(self.get_pool()).await?;
        }
        Ok(())
    }

    async fn insert<'a>(&self, record: Self::Record<'a>) -> Result<(), sqlx::Error> {
        let mut tx = self.get_pool().begin().await?;
        let query = format!(
            r#"INSERT OR IGNORE INTO {} (
                id,
                description,
                category,
                blockchain,
                device,
                status,
                nft,
                f2p,
                p2e,
                p2e_score,
                created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            self.name
        );
        sqlx::query(&query)
            .bind(record.name.trim())
            .bind(&record.description)
            .bind(&record.category)
            .bind(&record.blockchain)
            .bind(&record.device)
            .bind(&record.status)
            .bind(&record.nft)
            .bind(&record.f2p)
            .bind(&record.p2e)
            .bind(&record.p2e_score)
            .bind(utils::get_now())
            .execute(&mut tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<GameRecord>, sqlx::Error> {
        let mut games = vec![];
        let query = format!(
            "SELECT id, description, category, blockchain, device, status, nft, f2p, p2e, p2e_score \
             FROM {} ORDER BY created_at, rowid",
            self.name
        );
        let mut rows = sqlx::query(&query).fetch(self.get_pool());
        while let Some(row) = rows.try_next().await? {
            games.push(GameRecord {
                name: row.try_get("id")?,
                description: row.try_get("description")?,
                category: row.try_get("category")?,
                blockchain: row.try_get("blockchain")?,
                device: row.try_get("device")?,
                status: row.try_get("status")?,
                nft: row.try_get("nft")?,
                f2p: row.try_get("f2p")?,
                p2e: row.try_get("p2e")?,
                p2e_score: row.try_get("p2e_score")?,
            });
        }
        Ok(games)
    }
}

/// SQLite-backed store of admitted games, one table per crawl name.
pub struct PlayToEarnData {
    pub name: String,
    pub games: GameTable,
}

impl PlayToEarnData {
    pub async fn new(name: &str) -> Result<PlayToEarnData, CrawlerError> {
        let opt = SqliteConnectOptions::new()
            .filename(format!("{}.db", name))
            .create_if_missing(true);
        PlayToEarnData::connect(name, opt).await
    }

    pub async fn connect(
        name: &str,
        opt: SqliteConnectOptions,
    ) -> Result<PlayToEarnData, CrawlerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opt)
            .await?;
        let p = PlayToEarnData {
            name: name.to_string(),
            games: GameTable {
                name: format!("{}_games", name),
                pool,
            },
        };

        if !utils::is_table_exists(p.games.get_pool(), &p.games.name).await? {
            tracing::debug!("Create table {}", p.games.name);
            p.games.create().await?;
        } else {
            tracing::debug!("Use table {}", p.games.name);
        }

        Ok(p)
    }
}

#[async_trait::async_trait]
impl Sink for PlayToEarnData {
    async fn write(&self, record: GameRecord) -> Result<(), CrawlerError> {
        Ok(self.games.insert(&record).await?)
    }
}
