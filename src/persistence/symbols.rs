//! Symbol repository (§3): enrollment registry. Rows are created and
//! toggled by the operator; the ingestion pipeline only reads the
//! active set at startup.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::wire::models::Symbol;

pub struct SymbolRepository {
    pool: PgPool,
}

impl SymbolRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn active_symbols(&self) -> Result<Vec<Symbol>> {
        let rows = sqlx::query_as::<_, SymbolRow>(
            r#"
            SELECT id, symbol, base, quote, status, active, created_at, updated_at
            FROM symbols
            WHERE active = TRUE
            ORDER BY symbol ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("query active symbols")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn by_symbol(&self, symbol: &str) -> Result<Option<Symbol>> {
        let row = sqlx::query_as::<_, SymbolRow>(
            r#"
            SELECT id, symbol, base, quote, status, active, created_at, updated_at
            FROM symbols
            WHERE symbol = $1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .context("query symbol")?;

        Ok(row.map(Into::into))
    }
}

#[derive(sqlx::FromRow)]
struct SymbolRow {
    id: i64,
    symbol: String,
    base: String,
    quote: String,
    status: String,
    active: bool,
    created_at: i64,
    updated_at: i64,
}

impl From<SymbolRow> for Symbol {
    fn from(row: SymbolRow) -> Self {
        Symbol {
            id: row.id,
            symbol: row.symbol,
            base: row.base,
            quote: row.quote,
            status: row.status,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
