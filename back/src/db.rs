use std::{str::FromStr, time::Duration};

use eyre::WrapErr;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tracing::info;

/// Opens the pool and brings the schema up to date.
pub async fn connect(url: &str) -> eyre::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .wrap_err_with(|| format!("invalid database url `{url}`"))?
        .create_if_missing(true)
        .foreign_keys(true);

    // every in-memory connection is its own database, so keep exactly one alive
    let pool = if is_in_memory(url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new().connect_with(options).await?
    };

    sqlx::migrate!()
        .run(&pool)
        .await
        .wrap_err("failed to run migrations")?;

    info!(url, "database ready");

    Ok(pool)
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
