//! Shared connection-pool construction and schema migration.
//!
//! Both logical databases (shared/infra and model/events) are plain
//! Postgres, so they're built and migrated identically -- this is the one
//! place that logic lives, parameterised by `DatabaseSettings` and a schema
//! file path.

use anyhow::Context;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use log::{info, warn};
use tokio_postgres::NoTls;

use crate::config::DatabaseSettings;

/// Split SQL into statements, respecting dollar-quoted strings so that
/// function bodies containing embedded semicolons aren't cut in half.
pub fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut in_dollar_quote = false;
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if i + 1 < chars.len() && chars[i] == '$' && chars[i + 1] == '$' {
            in_dollar_quote = !in_dollar_quote;
            i += 2;
            continue;
        }

        if chars[i] == ';' && !in_dollar_quote {
            let stmt = &sql[start..i];
            if !stmt.trim().is_empty() {
                statements.push(stmt);
            }
            start = i + 1;
        }
        i += 1;
    }

    if start < sql.len() {
        let stmt = &sql[start..];
        if !stmt.trim().is_empty() {
            statements.push(stmt);
        }
    }

    statements
}

pub async fn connect_pool(settings: &DatabaseSettings, label: &str) -> anyhow::Result<Pool> {
    info!("Connecting to {label} Postgres at {}:{}", settings.host, settings.port);

    let mut retries = 0;
    let max_retries = 3;
    let mut last_error: Option<anyhow::Error> = None;

    loop {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&settings.host)
            .port(settings.port)
            .user(&settings.user)
            .password(&settings.password)
            .dbname(&settings.name);

        let mgr_config = ManagerConfig { recycling_method: RecyclingMethod::Fast };
        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(settings.pool_size)
            .build()
            .context("failed to build connection pool")?;

        match pool.get().await {
            Ok(_conn) => {
                info!("Connected to {label} Postgres");
                return Ok(pool);
            }
            Err(e) => {
                last_error = Some(anyhow::anyhow!("{e}"));
                retries += 1;
                if retries >= max_retries {
                    break;
                }
                let delay = std::time::Duration::from_millis(100 * 2_u64.pow(retries));
                warn!("Failed to connect to {label} Postgres (attempt {retries}/{max_retries}), retrying in {delay:?}...");
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(anyhow::anyhow!(
        "failed to connect to {label} Postgres after {max_retries} attempts: {}",
        last_error.map(|e| e.to_string()).unwrap_or_else(|| "unknown error".to_string())
    ))
}

pub async fn migrate(pool: &Pool, schema_path: &str) -> anyhow::Result<()> {
    info!("Running migrations from {schema_path}");
    let client = pool.get().await?;

    let schema = tokio::fs::read_to_string(schema_path)
        .await
        .with_context(|| format!("failed to read {schema_path}"))?;

    for stmt in split_sql_statements(&schema) {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        client
            .execute(stmt, &[])
            .await
            .with_context(|| format!("failed to execute migration statement: {stmt}"))?;
    }

    info!("Schema applied from {schema_path}");
    Ok(())
}
