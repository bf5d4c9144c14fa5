//! Database persistence for bot state checkpointing.
//!
//! Stores everything needed to resume after restart:
//! - Monitored wallets
//! - Seen transaction signatures (to avoid copying the same swap twice)
//! - Open positions and the daily trade budget
//! - Copy-trade records with execution status

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::models::{MonitoredWallet, Position};

/// Database connection pool with checkpoint state management.
pub struct Database {
    pool: SqlitePool,
}

/// Stored position record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredPosition {
    pub token: String,
    pub source_wallet: String,
    pub buy_price: f64,
    pub highest_price_seen: f64,
    pub size_remaining: f64,
    pub is_closed: bool,
    pub opened_at: String,
    pub updated_at: String,
}

impl StoredPosition {
    /// Convert back into the in-memory model.
    pub fn into_position(self) -> Position {
        Position {
            token: self.token,
            source_wallet: self.source_wallet,
            buy_price: Decimal::try_from(self.buy_price).unwrap_or(Decimal::ZERO),
            highest_price_seen: Decimal::try_from(self.highest_price_seen)
                .unwrap_or(Decimal::ZERO),
            size_remaining: Decimal::try_from(self.size_remaining).unwrap_or(Decimal::ZERO),
            is_closed: self.is_closed,
            opened_at: parse_timestamp(&self.opened_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

/// Stored copy-trade record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredCopyTrade {
    pub id: String,
    pub wallet_address: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_base_units: i64,
    pub price_at_tx: f64,
    pub status: String,
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub executed_at: Option<String>,
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl Database {
    /// Create a new database connection and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS monitored_wallets (
                address TEXT PRIMARY KEY,
                tag TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seen_transactions (
                signature TEXT PRIMARY KEY,
                wallet_address TEXT NOT NULL,
                token_out TEXT NOT NULL,
                seen_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                token TEXT NOT NULL,
                source_wallet TEXT NOT NULL,
                buy_price REAL NOT NULL,
                highest_price_seen REAL NOT NULL,
                size_remaining REAL NOT NULL,
                is_closed INTEGER NOT NULL DEFAULT 0,
                opened_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (token, source_wallet)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS copy_trades (
                id TEXT PRIMARY KEY,
                wallet_address TEXT NOT NULL,
                token_in TEXT NOT NULL,
                token_out TEXT NOT NULL,
                amount_base_units INTEGER NOT NULL,
                price_at_tx REAL NOT NULL,
                status TEXT NOT NULL,
                tx_hash TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                executed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trade_budget (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                day TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== Monitored Wallets ====================

    /// Add or relabel a monitored wallet.
    pub async fn save_wallet(&self, tag: &str, address: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO monitored_wallets (address, tag) VALUES (?, ?)
            ON CONFLICT(address) DO UPDATE SET tag = excluded.tag
            "#,
        )
        .bind(address)
        .bind(tag)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a wallet. Returns whether it existed.
    pub async fn remove_wallet(&self, address: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM monitored_wallets WHERE address = ?")
            .bind(address)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All monitored wallets, oldest first.
    pub async fn get_wallets(&self) -> Result<Vec<MonitoredWallet>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT tag, address FROM monitored_wallets ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(tag, address)| MonitoredWallet::new(tag, address))
            .collect())
    }

    // ==================== Seen Transactions ====================

    pub async fn has_seen_transaction(&self, signature: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM seen_transactions WHERE signature = ?")
                .bind(signature)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    pub async fn mark_transaction_seen(
        &self,
        signature: &str,
        wallet_address: &str,
        token_out: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO seen_transactions (signature, wallet_address, token_out)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(signature)
        .bind(wallet_address)
        .bind(token_out)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== Positions ====================

    /// Insert or update a position's full state.
    pub async fn upsert_position(&self, position: &Position) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO positions
                (token, source_wallet, buy_price, highest_price_seen,
                 size_remaining, is_closed, opened_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(token, source_wallet) DO UPDATE SET
                buy_price = excluded.buy_price,
                highest_price_seen = excluded.highest_price_seen,
                size_remaining = excluded.size_remaining,
                is_closed = excluded.is_closed,
                opened_at = excluded.opened_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&position.token)
        .bind(&position.source_wallet)
        .bind(position.buy_price.to_f64().unwrap_or(0.0))
        .bind(position.highest_price_seen.to_f64().unwrap_or(0.0))
        .bind(position.size_remaining.to_f64().unwrap_or(0.0))
        .bind(position.is_closed)
        .bind(position.opened_at.to_rfc3339())
        .bind(position.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All positions that are still open.
    pub async fn get_open_positions(&self) -> Result<Vec<Position>> {
        let rows: Vec<StoredPosition> =
            sqlx::query_as("SELECT * FROM positions WHERE is_closed = 0")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(StoredPosition::into_position).collect())
    }

    // ==================== Copy Trades ====================

    /// Record a copy-trade attempt before execution.
    pub async fn save_copy_trade(
        &self,
        id: &str,
        wallet_address: &str,
        token_in: &str,
        token_out: &str,
        amount_base_units: u64,
        price_at_tx: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO copy_trades
                (id, wallet_address, token_in, token_out, amount_base_units, price_at_tx, status)
            VALUES (?, ?, ?, ?, ?, ?, 'pending')
            "#,
        )
        .bind(id)
        .bind(wallet_address)
        .bind(token_in)
        .bind(token_out)
        .bind(amount_base_units as i64)
        .bind(price_at_tx)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Update a copy-trade after the execution attempt.
    pub async fn update_copy_trade_status(
        &self,
        id: &str,
        status: &str,
        tx_hash: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE copy_trades
            SET status = ?, tx_hash = ?, error_message = ?, executed_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(tx_hash)
        .bind(error_message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent copy-trade records, newest first.
    pub async fn get_recent_copy_trades(&self, limit: u32) -> Result<Vec<StoredCopyTrade>> {
        let rows: Vec<StoredCopyTrade> =
            sqlx::query_as("SELECT * FROM copy_trades ORDER BY created_at DESC LIMIT ?")
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows)
    }

    /// Copy-trade counts: (total, executed, failed).
    pub async fn copy_trade_stats(&self) -> Result<(i64, i64, i64)> {
        let row: (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(CASE WHEN status IN ('executed', 'simulated') THEN 1 END),
                COUNT(CASE WHEN status = 'failed' THEN 1 END)
            FROM copy_trades
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    // ==================== Trade Budget ====================

    /// Load the checkpointed budget, if any.
    pub async fn load_budget(&self) -> Result<Option<(NaiveDate, u32)>> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT day, count FROM trade_budget WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        let Some((day, count)) = row else {
            return Ok(None);
        };

        let day = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
            .context("Corrupt budget day in database")?;
        Ok(Some((day, count.max(0) as u32)))
    }

    /// Checkpoint the budget for the current day.
    pub async fn save_budget(&self, day: NaiveDate, count: u32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trade_budget (id, day, count) VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET day = excluded.day, count = excluded.count
            "#,
        )
        .bind(day.format("%Y-%m-%d").to_string())
        .bind(count as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
