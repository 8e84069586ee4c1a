use std::str::FromStr;

use sqlx::{
    Error, Pool, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;
use utils::assets::data_dir;

pub mod models;

#[derive(Clone)]
pub struct DBService {
    pub pool: Pool<Sqlite>,
}

impl DBService {
    /// Open the database at `database_url` (the default file under the data
    /// directory when `None`) and bring its schema up to date.
    pub async fn new(database_url: Option<&str>) -> Result<DBService, Error> {
        let database_url = match database_url {
            Some(url) => url.to_string(),
            None => format!(
                "sqlite://{}",
                data_dir().join("donations.sqlite").to_string_lossy()
            ),
        };
        let options = SqliteConnectOptions::from_str(&database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(database_url = %database_url, "Database ready");
        Ok(DBService { pool })
    }

    /// Private in-memory database. The pool holds a single connection that is
    /// never recycled, otherwise the schema would vanish with it.
    pub async fn new_in_memory() -> Result<DBService, Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(DBService { pool })
    }
}
