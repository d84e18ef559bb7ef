//! Repository layer
//!
//! Traits at the seams the engine depends on, and the SQLite implementation.
//! The uniqueness invariants are enforced by partial unique indexes; constraint
//! violations are mapped back to the matching policy error.

use crate::chain::Receipt;
use crate::db::{is_unique_violation, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::{
    deep_merge, Farm, LendingMarket, NewOperation, Operation, OperationStatus, OperationType,
    RunType, Strategy, StrategyContracts, StrategySettings,
};
use crate::utils::now_millis;
use alloy_primitives::{Address, I256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Persistence of operation records and their transaction ledger
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Insert a record. Fails with a policy error when a uniqueness invariant would break.
    async fn insert(&self, new: NewOperation) -> AppResult<Operation>;

    async fn get(&self, id: i64) -> AppResult<Option<Operation>>;

    /// Compare-and-swap status change with a deep-merged meta patch
    async fn update_status(
        &self,
        id: i64,
        from: OperationStatus,
        to: OperationStatus,
        meta_patch: &Value,
    ) -> AppResult<Operation>;

    /// Correlate a record with its scheduled job
    async fn set_job(&self, id: i64, job_id: &str, scheduled_at: DateTime<Utc>) -> AppResult<()>;

    /// Most recent records first
    async fn list(&self, strategy_id: i64, limit: i64) -> AppResult<Vec<Operation>>;

    async fn find_in_progress(&self, strategy_id: i64) -> AppResult<Option<Operation>>;

    async fn find_pending(
        &self,
        strategy_id: i64,
        op_type: OperationType,
    ) -> AppResult<Option<Operation>>;

    async fn find_pending_for_strategy(&self, strategy_id: i64) -> AppResult<Vec<Operation>>;

    async fn find_all_pending(&self) -> AppResult<Vec<Operation>>;

    async fn find_all_in_progress(&self) -> AppResult<Vec<Operation>>;

    async fn record_transaction(&self, operation_id: i64, receipt: &Receipt) -> AppResult<()>;

    /// Sum of gas_used * effective_gas_price over the recorded transactions
    async fn gas_cost(&self, operation_id: i64) -> AppResult<U256>;

    /// Last processed block of the most recent claim that distributed rewards
    async fn last_distribution_block(&self, strategy_id: i64) -> AppResult<Option<u64>>;

    /// Terminal records older than `cutoff` with no recorded transactions
    async fn find_orphans_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Operation>>;

    async fn delete(&self, id: i64) -> AppResult<()>;
}

/// Read-only strategy snapshot, re-read on every scheduling decision
#[async_trait]
pub trait StrategyConfigSource: Send + Sync {
    async fn strategy(&self, id: i64) -> AppResult<Strategy>;

    async fn farms(&self, strategy_id: i64) -> AppResult<Vec<Farm>>;

    async fn active_strategies(&self) -> AppResult<Vec<Strategy>>;
}

/// Persisted analytics result
#[derive(Debug, Clone)]
pub struct AnalyticsSnapshot {
    pub strategy_id: i64,
    /// Signed USD value scaled by 1e18
    pub net_usd: I256,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn save_snapshot(&self, strategy_id: i64, net_usd: I256, details: &Value) -> AppResult<()>;

    async fn latest_snapshot(&self, strategy_id: i64) -> AppResult<Option<AnalyticsSnapshot>>;
}

/// SQLite-backed implementation of every repository trait
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

#[derive(sqlx::FromRow)]
struct OperationRow {
    id: i64,
    strategy_id: i64,
    blockchain_id: i64,
    op_type: String,
    run_type: String,
    status: String,
    meta: String,
    job_id: Option<String>,
    pid: i64,
    scheduled_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<OperationRow> for Operation {
    type Error = AppError;

    fn try_from(row: OperationRow) -> Result<Self, Self::Error> {
        Ok(Operation {
            id: row.id,
            strategy_id: row.strategy_id,
            blockchain_id: row.blockchain_id,
            op_type: OperationType::from_str(&row.op_type).map_err(AppError::Internal)?,
            run_type: RunType::from_str(&row.run_type).map_err(AppError::Internal)?,
            status: OperationStatus::from_str(&row.status).map_err(AppError::Internal)?,
            meta: serde_json::from_str(&row.meta)?,
            job_id: row.job_id,
            pid: row.pid as u32,
            scheduled_at: row.scheduled_at.map(millis_to_datetime),
            created_at: millis_to_datetime(row.created_at),
            updated_at: millis_to_datetime(row.updated_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct StrategyRow {
    id: i64,
    name: String,
    blockchain_id: i64,
    contracts: String,
    operational_key_ref: String,
    boosting_key_ref: String,
    operational_wallet: String,
    boosting_wallet: String,
    is_active: bool,
    settings: String,
}

impl TryFrom<StrategyRow> for Strategy {
    type Error = AppError;

    fn try_from(row: StrategyRow) -> Result<Self, Self::Error> {
        let contracts: StrategyContracts = serde_json::from_str(&row.contracts)?;
        let settings: StrategySettings = serde_json::from_str(&row.settings)?;
        Ok(Strategy {
            id: row.id,
            name: row.name,
            blockchain_id: row.blockchain_id,
            contracts,
            operational_key_ref: row.operational_key_ref,
            boosting_key_ref: row.boosting_key_ref,
            operational_wallet: parse_address(&row.operational_wallet)?,
            boosting_wallet: parse_address(&row.boosting_wallet)?,
            is_active: row.is_active,
            settings,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FarmRow {
    id: i64,
    strategy_id: i64,
    platform: String,
    pair: String,
    token1: String,
    token2: String,
    router: String,
    master_chef: String,
    pid: i64,
    reward_token: String,
    percentage: String,
    is_active: bool,
}

impl TryFrom<FarmRow> for Farm {
    type Error = AppError;

    fn try_from(row: FarmRow) -> Result<Self, Self::Error> {
        let token1: LendingMarket = serde_json::from_str(&row.token1)?;
        let token2: LendingMarket = serde_json::from_str(&row.token2)?;
        Ok(Farm {
            id: row.id,
            strategy_id: row.strategy_id,
            platform: row.platform,
            pair: parse_address(&row.pair)?,
            token1,
            token2,
            router: parse_address(&row.router)?,
            master_chef: parse_address(&row.master_chef)?,
            pid: row.pid as u64,
            reward_token: parse_address(&row.reward_token)?,
            percentage: Decimal::from_str(&row.percentage)
                .map_err(|e| AppError::Internal(format!("bad farm percentage: {}", e)))?,
            is_active: row.is_active,
        })
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

fn parse_address(s: &str) -> AppResult<Address> {
    Address::from_str(s).map_err(|e| AppError::Internal(format!("bad address {}: {}", s, e)))
}

const OPERATION_COLUMNS: &str = "id, strategy_id, blockchain_id, op_type, run_type, status, meta, \
     job_id, pid, scheduled_at, created_at, updated_at";

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn fetch_operations(&self, sql: &str, binds: &[Bind<'_>]) -> AppResult<Vec<Operation>> {
        let mut query = sqlx::query_as::<_, OperationRow>(sql);
        for bind in binds {
            query = match bind {
                Bind::Int(v) => query.bind(*v),
                Bind::Text(v) => query.bind(*v),
            };
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Operation::try_from).collect()
    }

    async fn fetch_operation(&self, sql: &str, binds: &[Bind<'_>]) -> AppResult<Option<Operation>> {
        Ok(self.fetch_operations(sql, binds).await?.into_iter().next())
    }

    /// Register a strategy; returns its id
    pub async fn insert_strategy(&self, strategy: &Strategy) -> AppResult<i64> {
        let now = now_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO strategies (
                name, blockchain_id, contracts, operational_key_ref, boosting_key_ref,
                operational_wallet, boosting_wallet, is_active, settings, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&strategy.name)
        .bind(strategy.blockchain_id)
        .bind(serde_json::to_string(&strategy.contracts)?)
        .bind(&strategy.operational_key_ref)
        .bind(&strategy.boosting_key_ref)
        .bind(strategy.operational_wallet.to_string())
        .bind(strategy.boosting_wallet.to_string())
        .bind(strategy.is_active)
        .bind(serde_json::to_string(&strategy.settings)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Register a farm; returns its id
    pub async fn insert_farm(&self, farm: &Farm) -> AppResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO farms (
                strategy_id, platform, pair, token1, token2, router, master_chef,
                pid, reward_token, percentage, is_active
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(farm.strategy_id)
        .bind(&farm.platform)
        .bind(farm.pair.to_string())
        .bind(serde_json::to_string(&farm.token1)?)
        .bind(serde_json::to_string(&farm.token2)?)
        .bind(farm.router.to_string())
        .bind(farm.master_chef.to_string())
        .bind(farm.pid as i64)
        .bind(farm.reward_token.to_string())
        .bind(farm.percentage.to_string())
        .bind(farm.is_active)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn set_active(&self, strategy_id: i64, is_active: bool) -> AppResult<()> {
        let result = sqlx::query("UPDATE strategies SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(is_active)
            .bind(now_millis())
            .bind(strategy_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("strategy {}", strategy_id)));
        }
        Ok(())
    }

    /// Persist new settings. The strategy is forced inactive until restarted.
    pub async fn update_settings(
        &self,
        strategy_id: i64,
        settings: &StrategySettings,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE strategies SET settings = ?, is_active = 0, updated_at = ? WHERE id = ?",
        )
        .bind(serde_json::to_string(settings)?)
        .bind(now_millis())
        .bind(strategy_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("strategy {}", strategy_id)));
        }
        Ok(())
    }
}

enum Bind<'a> {
    Int(i64),
    Text(&'a str),
}

#[async_trait]
impl OperationStore for SqliteStore {
    async fn insert(&self, new: NewOperation) -> AppResult<Operation> {
        let now = now_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO operations (
                strategy_id, blockchain_id, op_type, run_type, status, meta, pid,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.strategy_id)
        .bind(new.blockchain_id)
        .bind(new.op_type.as_str())
        .bind(new.run_type.to_string())
        .bind(new.status.as_str())
        .bind(serde_json::to_string(&new.meta)?)
        .bind(new.pid as i64)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => self
                .get(done.last_insert_rowid())
                .await?
                .ok_or_else(|| AppError::Internal("inserted operation vanished".to_string())),
            Err(e) if is_unique_violation(&e) => {
                Err(self.conflict_error(new.strategy_id, new.op_type, new.status).await)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: i64) -> AppResult<Option<Operation>> {
        let sql = format!("SELECT {} FROM operations WHERE id = ?", OPERATION_COLUMNS);
        self.fetch_operation(&sql, &[Bind::Int(id)]).await
    }

    async fn update_status(
        &self,
        id: i64,
        from: OperationStatus,
        to: OperationStatus,
        meta_patch: &Value,
    ) -> AppResult<Operation> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("operation {}", id)))?;

        if current.status != from {
            return Err(AppError::InvalidTransition {
                id,
                from: current.status,
                to,
            });
        }

        let mut meta = current.meta.clone();
        deep_merge(&mut meta, meta_patch);

        let result = sqlx::query(
            "UPDATE operations SET status = ?, meta = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(serde_json::to_string(&meta)?)
        .bind(now_millis())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                // Lost a race with another writer
                let actual = self.get(id).await?.map(|op| op.status).unwrap_or(from);
                Err(AppError::InvalidTransition {
                    id,
                    from: actual,
                    to,
                })
            }
            Ok(_) => self
                .get(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("operation {}", id))),
            Err(e) if is_unique_violation(&e) => {
                Err(self.conflict_error(current.strategy_id, current.op_type, to).await)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_job(&self, id: i64, job_id: &str, scheduled_at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE operations SET job_id = ?, scheduled_at = ?, updated_at = ? WHERE id = ?")
            .bind(job_id)
            .bind(scheduled_at.timestamp_millis())
            .bind(now_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, strategy_id: i64, limit: i64) -> AppResult<Vec<Operation>> {
        let sql = format!(
            "SELECT {} FROM operations WHERE strategy_id = ? ORDER BY id DESC LIMIT ?",
            OPERATION_COLUMNS
        );
        self.fetch_operations(&sql, &[Bind::Int(strategy_id), Bind::Int(limit)])
            .await
    }

    async fn find_in_progress(&self, strategy_id: i64) -> AppResult<Option<Operation>> {
        let sql = format!(
            "SELECT {} FROM operations WHERE strategy_id = ? AND status = 'IN_PROGRESS'",
            OPERATION_COLUMNS
        );
        self.fetch_operation(&sql, &[Bind::Int(strategy_id)]).await
    }

    async fn find_pending(
        &self,
        strategy_id: i64,
        op_type: OperationType,
    ) -> AppResult<Option<Operation>> {
        let sql = format!(
            "SELECT {} FROM operations WHERE strategy_id = ? AND op_type = ? AND status = 'PENDING'",
            OPERATION_COLUMNS
        );
        self.fetch_operation(&sql, &[Bind::Int(strategy_id), Bind::Text(op_type.as_str())])
            .await
    }

    async fn find_pending_for_strategy(&self, strategy_id: i64) -> AppResult<Vec<Operation>> {
        let sql = format!(
            "SELECT {} FROM operations WHERE strategy_id = ? AND status = 'PENDING' ORDER BY id",
            OPERATION_COLUMNS
        );
        self.fetch_operations(&sql, &[Bind::Int(strategy_id)]).await
    }

    async fn find_all_pending(&self) -> AppResult<Vec<Operation>> {
        let sql = format!(
            "SELECT {} FROM operations WHERE status = 'PENDING' ORDER BY id",
            OPERATION_COLUMNS
        );
        self.fetch_operations(&sql, &[]).await
    }

    async fn find_all_in_progress(&self) -> AppResult<Vec<Operation>> {
        let sql = format!(
            "SELECT {} FROM operations WHERE status = 'IN_PROGRESS' ORDER BY id",
            OPERATION_COLUMNS
        );
        self.fetch_operations(&sql, &[]).await
    }

    async fn record_transaction(&self, operation_id: i64, receipt: &Receipt) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO operation_transactions (
                operation_id, tx_hash, block_number, gas_used, effective_gas_price, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(operation_id)
        .bind(receipt.tx_hash.to_string())
        .bind(receipt.block_number as i64)
        .bind(receipt.gas_used as i64)
        .bind(receipt.effective_gas_price.to_string())
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn gas_cost(&self, operation_id: i64) -> AppResult<U256> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT gas_used, effective_gas_price FROM operation_transactions WHERE operation_id = ?",
        )
        .bind(operation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().try_fold(U256::ZERO, |total, (gas_used, price)| {
            let price = U256::from_str(&price)
                .map_err(|e| AppError::Internal(format!("bad gas price {}: {}", price, e)))?;
            Ok(total.saturating_add(U256::from(gas_used as u64).saturating_mul(price)))
        })
    }

    async fn last_distribution_block(&self, strategy_id: i64) -> AppResult<Option<u64>> {
        let row: Option<(Option<i64>,)> = sqlx::query_as(
            r#"
            SELECT CAST(json_extract(meta, '$.payload.lastProcessedBlock') AS INTEGER)
            FROM operations
            WHERE strategy_id = ?
              AND op_type = 'CLAIM_RUN'
              AND status = 'SUCCESS'
              AND COALESCE(json_extract(meta, '$.payload.distributedAmount'), '0') != '0'
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(strategy_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(block,)| block).map(|b| b as u64))
    }

    async fn find_orphans_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Operation>> {
        let sql = format!(
            r#"
            SELECT {} FROM operations o
            WHERE o.status IN ('SUCCESS', 'FAILED', 'FAILED_SHUTDOWN')
              AND o.updated_at < ?
              AND NOT EXISTS (
                  SELECT 1 FROM operation_transactions t WHERE t.operation_id = o.id
              )
            ORDER BY o.id
            "#,
            OPERATION_COLUMNS
        );
        self.fetch_operations(&sql, &[Bind::Int(cutoff.timestamp_millis())])
            .await
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM operations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl SqliteStore {
    async fn conflict_error(
        &self,
        strategy_id: i64,
        op_type: OperationType,
        status: OperationStatus,
    ) -> AppError {
        match status {
            OperationStatus::InProgress => {
                let operation_id = match self.find_in_progress(strategy_id).await {
                    Ok(Some(op)) => op.id,
                    _ => 0,
                };
                AppError::OperationInProgressExists {
                    strategy_id,
                    operation_id,
                }
            }
            _ => AppError::OperationPendingExists {
                strategy_id,
                op_type,
            },
        }
    }
}

#[async_trait]
impl StrategyConfigSource for SqliteStore {
    async fn strategy(&self, id: i64) -> AppResult<Strategy> {
        let row: Option<StrategyRow> = sqlx::query_as(
            r#"
            SELECT id, name, blockchain_id, contracts, operational_key_ref, boosting_key_ref,
                   operational_wallet, boosting_wallet, is_active, settings
            FROM strategies WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("strategy {}", id)))?
            .try_into()
    }

    async fn farms(&self, strategy_id: i64) -> AppResult<Vec<Farm>> {
        let rows: Vec<FarmRow> = sqlx::query_as(
            r#"
            SELECT id, strategy_id, platform, pair, token1, token2, router, master_chef,
                   pid, reward_token, percentage, is_active
            FROM farms WHERE strategy_id = ? ORDER BY id
            "#,
        )
        .bind(strategy_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Farm::try_from).collect()
    }

    async fn active_strategies(&self) -> AppResult<Vec<Strategy>> {
        let rows: Vec<StrategyRow> = sqlx::query_as(
            r#"
            SELECT id, name, blockchain_id, contracts, operational_key_ref, boosting_key_ref,
                   operational_wallet, boosting_wallet, is_active, settings
            FROM strategies WHERE is_active = 1 ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Strategy::try_from).collect()
    }
}

#[async_trait]
impl AnalyticsStore for SqliteStore {
    async fn save_snapshot(&self, strategy_id: i64, net_usd: I256, details: &Value) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO analytics_snapshots (strategy_id, net_usd, details, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(strategy_id)
        .bind(net_usd.to_string())
        .bind(serde_json::to_string(details)?)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_snapshot(&self, strategy_id: i64) -> AppResult<Option<AnalyticsSnapshot>> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT net_usd, details, created_at FROM analytics_snapshots
            WHERE strategy_id = ? ORDER BY id DESC LIMIT 1
            "#,
        )
        .bind(strategy_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(net_usd, details, created_at)| {
            Ok(AnalyticsSnapshot {
                strategy_id,
                net_usd: I256::from_dec_str(&net_usd)
                    .map_err(|e| AppError::Internal(format!("bad net_usd {}: {}", net_usd, e)))?,
                details: serde_json::from_str(&details)?,
                created_at: millis_to_datetime(created_at),
            })
        })
        .transpose()
    }
}
