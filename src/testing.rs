//! In-memory collaborators and fixtures for tests
//!
//! - [`FakeChain`]: scripted reads, recorded writes, failure injection
//! - [`RecordingNotifier`]: keeps every event
//! - [`RecordingHandler`]: operation handler that records what it ran
//! - [`FlakyStore`]: operation store that fails status updates on demand

use crate::chain::{ChainClient, ChainError, ChainValue, ReadCall, Receipt, TransactionIntent};
use crate::engine::OperationHandler;
use crate::error::{AppError, AppResult};
use crate::models::{
    CronCheck, Farm, NewOperation, Operation, OperationStatus, OperationType, Strategy,
};
use crate::notifications::{NotificationEvent, NotificationSink};
use crate::store::OperationStore;
use crate::strategy::TxLog;
use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

type ReadKey = (Address, String, Option<Vec<ChainValue>>);

/// Scripted chain.
///
/// Reads resolve against an exact `(to, method, args)` script first, then a
/// `(to, method)` script for any args, and default to `Uint(0)`. A scripted
/// sequence yields its values in order and then repeats the last one.
#[derive(Default)]
pub struct FakeChain {
    reads: Mutex<HashMap<ReadKey, VecDeque<ChainValue>>>,
    sent: Mutex<Vec<TransactionIntent>>,
    failing_methods: Mutex<HashSet<String>>,
    send_limit: Mutex<Option<usize>>,
    native: Mutex<HashMap<Address, U256>>,
    block: AtomicU64,
    tx_count: AtomicU64,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, to: Address, method: &str, args: Vec<ChainValue>, value: ChainValue) {
        self.script_sequence(to, method, args, vec![value]);
    }

    pub fn script_sequence(
        &self,
        to: Address,
        method: &str,
        args: Vec<ChainValue>,
        values: Vec<ChainValue>,
    ) {
        self.reads
            .lock()
            .insert((to, method.to_string(), Some(args)), values.into());
    }

    /// Answer `method` on `to` whatever the arguments
    pub fn script_any(&self, to: Address, method: &str, value: ChainValue) {
        self.reads
            .lock()
            .insert((to, method.to_string(), None), VecDeque::from([value]));
    }

    pub fn set_block(&self, block: u64) {
        self.block.store(block, Ordering::SeqCst);
    }

    pub fn set_native_balance(&self, address: Address, balance: U256) {
        self.native.lock().insert(address, balance);
    }

    /// Make every send of `method` revert
    pub fn fail_method(&self, method: &str) {
        self.failing_methods.lock().insert(method.to_string());
    }

    /// Make every send revert once `count` transactions were mined
    pub fn fail_after_sends(&self, count: usize) {
        *self.send_limit.lock() = Some(count);
    }

    pub fn sent(&self) -> Vec<TransactionIntent> {
        self.sent.lock().clone()
    }

    pub fn sent_methods(&self) -> Vec<String> {
        self.sent.lock().iter().map(|intent| intent.method.clone()).collect()
    }

    pub fn count_sent(&self, method: &str) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|intent| intent.method == method)
            .count()
    }

    fn next_read(&self, call: &ReadCall) -> ChainValue {
        let mut reads = self.reads.lock();
        let exact = (call.to, call.method.clone(), Some(call.args.clone()));
        let any = (call.to, call.method.clone(), None);
        let queue = if reads.contains_key(&exact) {
            reads.get_mut(&exact)
        } else {
            reads.get_mut(&any)
        };
        match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(ChainValue::Uint(U256::ZERO)),
            Some(queue) => queue.front().cloned().unwrap_or(ChainValue::Uint(U256::ZERO)),
            None => ChainValue::Uint(U256::ZERO),
        }
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn call(&self, call: &ReadCall) -> Result<ChainValue, ChainError> {
        Ok(self.next_read(call))
    }

    async fn send_transaction(&self, intent: &TransactionIntent) -> Result<Receipt, ChainError> {
        if self.failing_methods.lock().contains(&intent.method) {
            return Err(ChainError::Reverted(format!("{} reverted", intent.method)));
        }
        let limit = *self.send_limit.lock();
        {
            let mut sent = self.sent.lock();
            if limit.is_some_and(|limit| sent.len() >= limit) {
                return Err(ChainError::Reverted(format!("{} reverted", intent.method)));
            }
            sent.push(intent.clone());
        }

        let n = self.tx_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut hash = [0u8; 32];
        hash[24..].copy_from_slice(&n.to_be_bytes());
        Ok(Receipt {
            tx_hash: TxHash::from(hash),
            block_number: self.block.load(Ordering::SeqCst),
            gas_used: 21_000,
            effective_gas_price: U256::from(1_000_000_000u64),
            success: true,
        })
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.block.load(Ordering::SeqCst))
    }

    async fn native_balance(&self, address: Address) -> Result<U256, ChainError> {
        Ok(self
            .native
            .lock()
            .get(&address)
            .copied()
            .unwrap_or(U256::ZERO))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, template_id: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.template_id() == template_id)
            .count()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, event: NotificationEvent) {
        self.events.lock().push(event);
    }
}

/// Handler that records runs, optionally sleeping or failing
#[derive(Default)]
pub struct RecordingHandler {
    runs: Mutex<Vec<(i64, OperationType)>>,
    checks: Mutex<Vec<(i64, CronCheck)>>,
    failing: Mutex<HashSet<OperationType>>,
    delay: Mutex<Duration>,
    receipts_per_run: AtomicU64,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op_type: OperationType) {
        self.failing.lock().insert(op_type);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Fake receipts pushed to the log on every run
    pub fn set_receipts_per_run(&self, count: u64) {
        self.receipts_per_run.store(count, Ordering::SeqCst);
    }

    pub fn runs(&self) -> Vec<(i64, OperationType)> {
        self.runs.lock().clone()
    }

    pub fn run_count(&self, op_type: OperationType) -> usize {
        self.runs.lock().iter().filter(|(_, t)| *t == op_type).count()
    }

    pub fn checks(&self) -> Vec<(i64, CronCheck)> {
        self.checks.lock().clone()
    }
}

#[async_trait]
impl OperationHandler for RecordingHandler {
    async fn wallet_balances(&self, strategy: &Strategy) -> AppResult<Value> {
        Ok(json!({ "wallet": strategy.operational_wallet.to_string(), "native": "0" }))
    }

    async fn run_operation(
        &self,
        op_type: OperationType,
        strategy: &Strategy,
        _farms: &[Farm],
        log: &mut TxLog,
    ) -> AppResult<Value> {
        self.runs.lock().push((strategy.id, op_type));
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        for n in 0..self.receipts_per_run.load(Ordering::SeqCst) {
            let mut hash = [0u8; 32];
            hash[24..].copy_from_slice(&(n + 1).to_be_bytes());
            hash[0] = strategy.id as u8;
            log.receipts.push(Receipt {
                tx_hash: TxHash::from(hash),
                block_number: 1,
                gas_used: 50_000,
                effective_gas_price: U256::from(2u64),
                success: true,
            });
        }

        if self.failing.lock().contains(&op_type) {
            return Err(AppError::Chain(ChainError::Reverted(format!("{} reverted", op_type))));
        }
        Ok(json!({ "ran": op_type.as_str() }))
    }

    async fn run_check(
        &self,
        check: CronCheck,
        strategy: &Strategy,
        _farms: &[Farm],
    ) -> AppResult<Value> {
        self.checks.lock().push((strategy.id, check));
        Ok(json!({ "check": check.as_str() }))
    }
}

/// Store wrapper whose next status update fails like a dropped connection
pub struct FlakyStore {
    inner: Arc<dyn OperationStore>,
    fail_next_update: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn OperationStore>) -> Self {
        Self {
            inner,
            fail_next_update: AtomicBool::new(false),
        }
    }

    pub fn fail_next_update(&self) {
        self.fail_next_update.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OperationStore for FlakyStore {
    async fn insert(&self, new: NewOperation) -> AppResult<Operation> {
        self.inner.insert(new).await
    }

    async fn get(&self, id: i64) -> AppResult<Option<Operation>> {
        self.inner.get(id).await
    }

    async fn update_status(
        &self,
        id: i64,
        from: OperationStatus,
        to: OperationStatus,
        meta_patch: &Value,
    ) -> AppResult<Operation> {
        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.update_status(id, from, to, meta_patch).await
    }

    async fn set_job(&self, id: i64, job_id: &str, scheduled_at: DateTime<Utc>) -> AppResult<()> {
        self.inner.set_job(id, job_id, scheduled_at).await
    }

    async fn list(&self, strategy_id: i64, limit: i64) -> AppResult<Vec<Operation>> {
        self.inner.list(strategy_id, limit).await
    }

    async fn find_in_progress(&self, strategy_id: i64) -> AppResult<Option<Operation>> {
        self.inner.find_in_progress(strategy_id).await
    }

    async fn find_pending(
        &self,
        strategy_id: i64,
        op_type: OperationType,
    ) -> AppResult<Option<Operation>> {
        self.inner.find_pending(strategy_id, op_type).await
    }

    async fn find_pending_for_strategy(&self, strategy_id: i64) -> AppResult<Vec<Operation>> {
        self.inner.find_pending_for_strategy(strategy_id).await
    }

    async fn find_all_pending(&self) -> AppResult<Vec<Operation>> {
        self.inner.find_all_pending().await
    }

    async fn find_all_in_progress(&self) -> AppResult<Vec<Operation>> {
        self.inner.find_all_in_progress().await
    }

    async fn record_transaction(&self, operation_id: i64, receipt: &Receipt) -> AppResult<()> {
        self.inner.record_transaction(operation_id, receipt).await
    }

    async fn gas_cost(&self, operation_id: i64) -> AppResult<U256> {
        self.inner.gas_cost(operation_id).await
    }

    async fn last_distribution_block(&self, strategy_id: i64) -> AppResult<Option<u64>> {
        self.inner.last_distribution_block(strategy_id).await
    }

    async fn find_orphans_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Operation>> {
        self.inner.find_orphans_older_than(cutoff).await
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        self.inner.delete(id).await
    }
}

/// Deterministic strategies and farms
pub mod fixtures {
    use crate::models::{
        CommonSettings, Farm, LblSettings, LbfSettings, LendingMarket, PreserveTier, Strategy,
        StrategyContracts, StrategySettings,
    };
    use alloy_primitives::Address;
    use rust_decimal::Decimal;

    pub fn address(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    pub const LOGIC: u8 = 0x10;
    pub const STORAGE: u8 = 0x11;
    pub const ORACLE: u8 = 0x12;
    pub const ROUTER: u8 = 0x13;
    pub const REWARD_TOKEN: u8 = 0x14;
    pub const LENDING_REWARD_TOKEN: u8 = 0x15;
    pub const BASE_TOKEN: u8 = 0x16;
    pub const BASE_V_TOKEN: u8 = 0x17;
    pub const OPERATIONAL_WALLET: u8 = 0x20;
    pub const BOOSTING_WALLET: u8 = 0x21;

    pub const PAIR: u8 = 0x30;
    pub const TOKEN1: u8 = 0x31;
    pub const TOKEN2: u8 = 0x32;
    pub const MASTER_CHEF: u8 = 0x33;
    pub const FARM_REWARD_TOKEN: u8 = 0x34;
    pub const V_TOKEN1: u8 = 0x41;
    pub const V_TOKEN2: u8 = 0x42;

    pub fn dec(s: &str) -> Decimal {
        s.parse().unwrap_or(Decimal::ZERO)
    }

    pub fn common_settings() -> CommonSettings {
        CommonSettings {
            strategy_timeout_ms: 60_000,
            claim_timeout_ms: 60_000,
            venus_claim_timeout_ms: 60_000,
            admin_balance_check_timeout_ms: 60_000,
            analytics_timeout_ms: 60_000,
            boosting_balance_check_timeout_ms: 60_000,
            is_strategy_autostart: false,
            is_claim_autostart: false,
            is_venus_claim_autostart: false,
            is_admin_balance_check_enabled: false,
            is_analytics_enabled: false,
            is_boosting_balance_check_enabled: false,
            max_rewards_per_run: dec("1"),
            distribute_even_if_negative: false,
            notifications_enabled: true,
            boosting_enabled: false,
            boosting_tokens_per_block: Decimal::ZERO,
            min_admin_balance: dec("0.5"),
            min_boosting_balance: dec("100"),
            slippage_bps: 100,
        }
    }

    pub fn lbf_settings() -> LbfSettings {
        LbfSettings {
            common: common_settings(),
            borrow_limit_percentage_min: dec("0.88"),
            borrow_limit_percentage: dec("0.92"),
            borrow_limit_percentage_max: dec("0.96"),
            preserve_tiers: vec![PreserveTier {
                min_storage_usd: Decimal::ZERO,
                preserve_percent: Decimal::ZERO,
            }],
        }
    }

    pub fn lbl_settings() -> LblSettings {
        LblSettings {
            common: common_settings(),
            borrow_limit_percentage_max: dec("0.9"),
        }
    }

    pub fn contracts() -> StrategyContracts {
        StrategyContracts {
            logic: address(LOGIC),
            storage: address(STORAGE),
            oracle: address(ORACLE),
            router: address(ROUTER),
            reward_token: address(REWARD_TOKEN),
            lending_reward_token: address(LENDING_REWARD_TOKEN),
            base_asset: LendingMarket {
                token: address(BASE_TOKEN),
                v_token: address(BASE_V_TOKEN),
            },
            interest_markets: Vec::new(),
        }
    }

    pub fn strategy_with(id: i64, settings: StrategySettings) -> Strategy {
        Strategy {
            id,
            name: format!("strategy-{}", id),
            blockchain_id: 56,
            contracts: contracts(),
            operational_key_ref: "operational".to_string(),
            boosting_key_ref: "boosting".to_string(),
            operational_wallet: address(OPERATIONAL_WALLET),
            boosting_wallet: address(BOOSTING_WALLET),
            is_active: true,
            settings,
        }
    }

    pub fn lbf_strategy(id: i64) -> Strategy {
        strategy_with(id, StrategySettings::Lbf(lbf_settings()))
    }

    pub fn lbl_strategy(id: i64) -> Strategy {
        strategy_with(id, StrategySettings::Lbl(lbl_settings()))
    }

    pub fn farm(strategy_id: i64) -> Farm {
        Farm {
            id: 1,
            strategy_id,
            platform: "pancakeswap".to_string(),
            pair: address(PAIR),
            token1: LendingMarket {
                token: address(TOKEN1),
                v_token: address(V_TOKEN1),
            },
            token2: LendingMarket {
                token: address(TOKEN2),
                v_token: address(V_TOKEN2),
            },
            router: address(ROUTER),
            master_chef: address(MASTER_CHEF),
            pid: 1,
            reward_token: address(FARM_REWARD_TOKEN),
            percentage: Decimal::ONE,
            is_active: true,
        }
    }
}
