//! Connected and cache-only store variants.
//!
//! [`Backend::select`](crate::Backend::select) probes the remote store once
//! per operation and hands back an [`ActiveStore`]; reads use
//! [`Backend::select_for_read`](crate::Backend::select_for_read), which also
//! serves the cache when the store refuses the probe. Callers use it through
//! [`LedgerStore`] and [`KeyStore`] without branching on connectivity.
//!
//! A [`ConnectedStore`] that hits a connectivity failure mid-operation
//! degrades itself: that call and every later call on the same value are
//! served by its cache-only fallback, and its status becomes
//! [`SyncStatus::LocalOnly`].
//!
//! Pot balances read through a connected store already account for balance
//! ops still waiting in the offline queue, and new balance writes for such a
//! pot join the queue behind them rather than overtaking them.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use taquilla_db::queries::offline_queue::{self, OpKind};
use taquilla_db::queries::{api_keys, pots, withdrawals};
use taquilla_store::{rows, Filter, Gateway, Query, RemoteStore, StoreError, Table};
use taquilla_types::{ApiKey, Cents, Pot, RecordId, Withdrawal};
use tracing::{debug, warn};

use crate::api_keys::ApiKeyPatch;
use crate::filter::WithdrawalFilter;
use crate::sync::{self, QueuedDebit, QueuedDelete, QueuedInsert, QueuedKeyDelete, QueuedKeyUpdate};
use crate::{now_millis, Cache, DataSource, LedgerError, Result, SyncStatus};

/// Pot and withdrawal persistence.
pub trait LedgerStore: Send + Sync {
    /// Where writes made through this store end up.
    fn status(&self) -> SyncStatus;

    /// The pot with queued balance ops applied on top of the stored value.
    fn read_pot(&self, name: &str) -> impl Future<Output = Result<Option<Pot>>> + Send;

    fn list_pots(&self) -> impl Future<Output = Result<Vec<Pot>>> + Send;

    /// Persist an existing pot's balance and colour.
    fn write_pot(&self, pot: &Pot) -> impl Future<Output = Result<()>> + Send;

    /// Take `amount` from a pot whose balance was just validated. Returns
    /// the pot as it stands afterwards.
    fn debit_pot(&self, pot: &Pot, amount: Cents) -> impl Future<Output = Result<Pot>> + Send;

    /// Register a new pot. Requires the remote store.
    fn create_pot(&self, pot: &Pot) -> impl Future<Output = Result<Pot>> + Send;

    fn append_withdrawal(
        &self,
        from_pot: &str,
        amount: Cents,
        at: &DateTime<Utc>,
    ) -> impl Future<Output = Result<Withdrawal>> + Send;

    fn remove_withdrawal(&self, id: &RecordId) -> impl Future<Output = Result<()>> + Send;

    fn list_withdrawals(
        &self,
        filter: &WithdrawalFilter,
    ) -> impl Future<Output = Result<(Vec<Withdrawal>, DataSource)>> + Send;
}

/// API key persistence.
pub trait KeyStore: Send + Sync {
    fn list_keys(&self) -> impl Future<Output = Result<Vec<ApiKey>>> + Send;

    fn find_key_by_hash(&self, hash: &str) -> impl Future<Output = Result<Option<ApiKey>>> + Send;

    fn insert_key(&self, key: &ApiKey) -> impl Future<Output = Result<ApiKey>> + Send;

    fn update_key(
        &self,
        id: &str,
        patch: &ApiKeyPatch,
    ) -> impl Future<Output = Result<ApiKey>> + Send;

    fn delete_key(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}

// ---------------------------------------------------------------------------
// Cache-only
// ---------------------------------------------------------------------------

/// Serves everything from the cache mirror and queues remote writes.
#[derive(Clone, Copy)]
pub struct CacheOnlyStore<'a> {
    cache: &'a Cache,
}

impl<'a> CacheOnlyStore<'a> {
    pub fn new(cache: &'a Cache) -> Self {
        Self { cache }
    }

    /// Update the cached pot row without queueing anything.
    pub async fn remember_pot(&self, pot: &Pot) -> Result<()> {
        let conn = self.cache.lock().await;
        pots::upsert(&conn, pot, now_millis())?;
        Ok(())
    }

    /// Cache a pot fetched from the store, with queued balance ops applied.
    pub async fn remember_remote_pot(&self, mut pot: Pot) -> Result<Pot> {
        let conn = self.cache.lock().await;
        let ops = offline_queue::pending(&conn)?;
        pot.balance = sync::pending_balance(&ops, &pot.name, pot.balance);
        pots::upsert(&conn, &pot, now_millis())?;
        Ok(pot)
    }

    pub async fn remember_remote_pots(&self, mut listing: Vec<Pot>) -> Result<Vec<Pot>> {
        let conn = self.cache.lock().await;
        let ops = offline_queue::pending(&conn)?;
        for pot in &mut listing {
            pot.balance = sync::pending_balance(&ops, &pot.name, pot.balance);
        }
        pots::replace_all(&conn, &listing, now_millis())?;
        Ok(listing)
    }

    /// Whether the queue holds balance ops for `pot` that the store has not
    /// seen yet.
    async fn has_pending_pot_ops(&self, pot: &str) -> Result<bool> {
        let conn = self.cache.lock().await;
        Ok(offline_queue::pending(&conn)?
            .iter()
            .any(|op| sync::queued_pot(op) == Some(pot)))
    }

    pub async fn remember_key(&self, key: &ApiKey) -> Result<()> {
        let conn = self.cache.lock().await;
        api_keys::upsert(&conn, key)?;
        Ok(())
    }

    async fn forget_key(&self, id: &str) -> Result<()> {
        let conn = self.cache.lock().await;
        match api_keys::delete(&conn, id) {
            Ok(()) | Err(taquilla_db::DbError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the cached key list with a remote listing, keeping keys whose
    /// creation is still queued.
    pub async fn remember_keys(&self, remote: Vec<ApiKey>) -> Result<Vec<ApiKey>> {
        let conn = self.cache.lock().await;
        let unsynced = sync::pending_values(&conn, OpKind::InsertApiKey, "id")?;
        let mut merged: Vec<ApiKey> = api_keys::list(&conn)?
            .into_iter()
            .filter(|k| unsynced.contains(&k.id))
            .collect();
        merged.extend(remote.into_iter().filter(|k| !unsynced.contains(&k.id)));
        merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        api_keys::replace_all(&conn, &merged)?;
        Ok(merged)
    }
}

impl LedgerStore for CacheOnlyStore<'_> {
    fn status(&self) -> SyncStatus {
        SyncStatus::LocalOnly
    }

    async fn read_pot(&self, name: &str) -> Result<Option<Pot>> {
        let conn = self.cache.lock().await;
        Ok(pots::get(&conn, name)?)
    }

    async fn list_pots(&self) -> Result<Vec<Pot>> {
        let conn = self.cache.lock().await;
        Ok(pots::list(&conn)?)
    }

    async fn write_pot(&self, pot: &Pot) -> Result<()> {
        let conn = self.cache.lock().await;
        let tx = conn.unchecked_transaction().map_err(taquilla_db::DbError::from)?;
        pots::upsert(&tx, pot, now_millis())?;
        offline_queue::enqueue(&tx, OpKind::UpdatePotBalance, &sync::encode(pot)?, &Utc::now())?;
        tx.commit().map_err(taquilla_db::DbError::from)?;
        Ok(())
    }

    async fn debit_pot(&self, pot: &Pot, amount: Cents) -> Result<Pot> {
        let debited = Pot {
            balance: pot.balance.saturating_sub(amount),
            ..pot.clone()
        };
        let payload = sync::encode(&QueuedDebit {
            pot: pot.name.clone(),
            amount,
        })?;
        let conn = self.cache.lock().await;
        let tx = conn.unchecked_transaction().map_err(taquilla_db::DbError::from)?;
        pots::upsert(&tx, &debited, now_millis())?;
        offline_queue::enqueue(&tx, OpKind::DebitPot, &payload, &Utc::now())?;
        tx.commit().map_err(taquilla_db::DbError::from)?;
        debug!(pot = %debited.name, amount, "queued pot debit");
        Ok(debited)
    }

    async fn create_pot(&self, pot: &Pot) -> Result<Pot> {
        Err(LedgerError::Connectivity(format!(
            "cannot create pot '{}' while the remote store is unreachable",
            pot.name
        )))
    }

    async fn append_withdrawal(
        &self,
        from_pot: &str,
        amount: Cents,
        at: &DateTime<Utc>,
    ) -> Result<Withdrawal> {
        let withdrawal = Withdrawal {
            id: RecordId::new_local(),
            from_pot: from_pot.to_string(),
            amount,
            timestamp: *at,
        };
        let payload = sync::encode(&QueuedInsert {
            local_id: withdrawal.id.value.clone(),
            from_pot: withdrawal.from_pot.clone(),
            amount,
            created_at: *at,
        })?;
        let conn = self.cache.lock().await;
        offline_queue::enqueue(&conn, OpKind::InsertWithdrawal, &payload, &Utc::now())?;
        debug!(id = %withdrawal.id, "queued withdrawal insert");
        Ok(withdrawal)
    }

    async fn remove_withdrawal(&self, id: &RecordId) -> Result<()> {
        let conn = self.cache.lock().await;
        if id.is_local() {
            // The store never saw it; cancelling the queued insert is enough.
            if !sync::drop_pending(&conn, OpKind::InsertWithdrawal, "local_id", &id.value)? {
                debug!(%id, "no queued insert for local withdrawal");
            }
            return Ok(());
        }
        let payload = sync::encode(&QueuedDelete {
            remote_id: id.value.clone(),
        })?;
        offline_queue::enqueue(&conn, OpKind::DeleteWithdrawal, &payload, &Utc::now())?;
        Ok(())
    }

    async fn list_withdrawals(
        &self,
        filter: &WithdrawalFilter,
    ) -> Result<(Vec<Withdrawal>, DataSource)> {
        let conn = self.cache.lock().await;
        let cached = withdrawals::list(&conn)?;
        Ok((filter.apply(&cached), DataSource::Cache))
    }
}

impl KeyStore for CacheOnlyStore<'_> {
    async fn list_keys(&self) -> Result<Vec<ApiKey>> {
        let conn = self.cache.lock().await;
        Ok(api_keys::list(&conn)?)
    }

    async fn find_key_by_hash(&self, hash: &str) -> Result<Option<ApiKey>> {
        let conn = self.cache.lock().await;
        Ok(api_keys::list(&conn)?.into_iter().find(|k| k.key_hash == hash))
    }

    async fn insert_key(&self, key: &ApiKey) -> Result<ApiKey> {
        let conn = self.cache.lock().await;
        let tx = conn.unchecked_transaction().map_err(taquilla_db::DbError::from)?;
        api_keys::upsert(&tx, key)?;
        offline_queue::enqueue(&tx, OpKind::InsertApiKey, &sync::encode(key)?, &Utc::now())?;
        tx.commit().map_err(taquilla_db::DbError::from)?;
        Ok(key.clone())
    }

    async fn update_key(&self, id: &str, patch: &ApiKeyPatch) -> Result<ApiKey> {
        let conn = self.cache.lock().await;
        let mut key = api_keys::list(&conn)?
            .into_iter()
            .find(|k| k.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("api key '{id}'")))?;
        patch.apply(&mut key);

        let tx = conn.unchecked_transaction().map_err(taquilla_db::DbError::from)?;
        api_keys::upsert(&tx, &key)?;
        let payload = sync::encode(&QueuedKeyUpdate {
            id: id.to_string(),
            patch: patch.clone(),
        })?;
        offline_queue::enqueue(&tx, OpKind::UpdateApiKey, &payload, &Utc::now())?;
        tx.commit().map_err(taquilla_db::DbError::from)?;
        Ok(key)
    }

    async fn delete_key(&self, id: &str) -> Result<()> {
        let conn = self.cache.lock().await;
        match api_keys::delete(&conn, id) {
            Ok(()) => {}
            Err(taquilla_db::DbError::NotFound(_)) => {
                return Err(LedgerError::NotFound(format!("api key '{id}'")))
            }
            Err(e) => return Err(e.into()),
        }
        if sync::drop_pending(&conn, OpKind::InsertApiKey, "id", id)? {
            return Ok(());
        }
        let payload = sync::encode(&QueuedKeyDelete { id: id.to_string() })?;
        offline_queue::enqueue(&conn, OpKind::DeleteApiKey, &payload, &Utc::now())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Connected
// ---------------------------------------------------------------------------

/// Writes through to the remote store, mirroring results into the cache.
pub struct ConnectedStore<'a, R> {
    gateway: &'a Gateway<R>,
    fallback: CacheOnlyStore<'a>,
    degraded: AtomicBool,
    /// A write was queued behind earlier offline ops instead of sent.
    deferred: AtomicBool,
}

impl<'a, R: RemoteStore> ConnectedStore<'a, R> {
    pub fn new(gateway: &'a Gateway<R>, fallback: CacheOnlyStore<'a>) -> Self {
        Self {
            gateway,
            fallback,
            degraded: AtomicBool::new(false),
            deferred: AtomicBool::new(false),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    fn degrade(&self, op: &str, reason: &str) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            warn!(op, reason, "remote store unreachable, continuing against local cache");
        }
    }

    /// Whether a write to `pot` must wait in the queue behind balance ops
    /// recorded while offline.
    async fn defer_for(&self, pot: &str) -> Result<bool> {
        let deferred = self.fallback.has_pending_pot_ops(pot).await?;
        if deferred {
            debug!(pot, "queued behind pending balance ops");
            self.deferred.store(true, Ordering::Release);
        }
        Ok(deferred)
    }

    /// Reads fall back to the cache on any failure; only connectivity
    /// failures degrade the store.
    fn read_failed(&self, op: &str, e: &StoreError) {
        if e.is_connectivity() {
            self.degrade(op, &e.to_string());
        } else {
            warn!(op, error = %e, "remote read failed, serving cached data");
        }
    }
}

impl<R: RemoteStore> LedgerStore for ConnectedStore<'_, R> {
    fn status(&self) -> SyncStatus {
        if self.is_degraded() || self.deferred.load(Ordering::Acquire) {
            SyncStatus::LocalOnly
        } else {
            SyncStatus::Synced
        }
    }

    async fn read_pot(&self, name: &str) -> Result<Option<Pot>> {
        if self.is_degraded() {
            return self.fallback.read_pot(name).await;
        }
        let query = Query::new(Table::Pots).filter(Filter::eq("name", name)).limit(1);
        let fetched = self
            .gateway
            .query(&query)
            .await
            .and_then(|found| found.first().map(rows::pot).transpose());
        match fetched {
            Ok(Some(pot)) => Ok(Some(self.fallback.remember_remote_pot(pot).await?)),
            Ok(None) => Ok(None),
            Err(e) => {
                self.read_failed("read_pot", &e);
                self.fallback.read_pot(name).await
            }
        }
    }

    async fn list_pots(&self) -> Result<Vec<Pot>> {
        if self.is_degraded() {
            return self.fallback.list_pots().await;
        }
        let query = Query::new(Table::Pots).order_by("name", false);
        let fetched = self
            .gateway
            .query(&query)
            .await
            .and_then(|found| found.iter().map(rows::pot).collect::<std::result::Result<Vec<_>, _>>());
        match fetched {
            Ok(listing) => self.fallback.remember_remote_pots(listing).await,
            Err(e) => {
                self.read_failed("list_pots", &e);
                self.fallback.list_pots().await
            }
        }
    }

    async fn write_pot(&self, pot: &Pot) -> Result<()> {
        if self.is_degraded() || self.defer_for(&pot.name).await? {
            return self.fallback.write_pot(pot).await;
        }
        match self
            .gateway
            .update(Table::Pots, &pot.name, rows::pot_row(pot))
            .await
        {
            Ok(_) => self.fallback.remember_pot(pot).await,
            Err(StoreError::Connectivity(reason)) => {
                self.degrade("write_pot", &reason);
                self.fallback.write_pot(pot).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn debit_pot(&self, pot: &Pot, amount: Cents) -> Result<Pot> {
        // Queued balance ops for this pot replay in order; a debit written
        // straight to the store would land ahead of them.
        if self.is_degraded() || self.defer_for(&pot.name).await? {
            return self.fallback.debit_pot(pot, amount).await;
        }
        let debited = Pot {
            balance: pot.balance.saturating_sub(amount),
            ..pot.clone()
        };
        match self
            .gateway
            .update(Table::Pots, &debited.name, rows::pot_row(&debited))
            .await
        {
            Ok(_) => {
                self.fallback.remember_pot(&debited).await?;
                Ok(debited)
            }
            Err(StoreError::Connectivity(reason)) => {
                self.degrade("debit_pot", &reason);
                self.fallback.debit_pot(pot, amount).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_pot(&self, pot: &Pot) -> Result<Pot> {
        if self.is_degraded() {
            return self.fallback.create_pot(pot).await;
        }
        let created = self
            .gateway
            .insert(Table::Pots, rows::pot_row(pot))
            .await
            .and_then(|row| rows::pot(&row));
        match created {
            Ok(stored) => {
                self.fallback.remember_pot(&stored).await?;
                Ok(stored)
            }
            Err(StoreError::Connectivity(reason)) => {
                self.degrade("create_pot", &reason);
                self.fallback.create_pot(pot).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn append_withdrawal(
        &self,
        from_pot: &str,
        amount: Cents,
        at: &DateTime<Utc>,
    ) -> Result<Withdrawal> {
        if self.is_degraded() {
            return self.fallback.append_withdrawal(from_pot, amount, at).await;
        }
        let inserted = self
            .gateway
            .insert(Table::Withdrawals, rows::withdrawal_insert(from_pot, amount, at))
            .await
            .and_then(|row| rows::withdrawal(&row));
        match inserted {
            Ok(withdrawal) => Ok(withdrawal),
            Err(StoreError::Connectivity(reason)) => {
                self.degrade("append_withdrawal", &reason);
                self.fallback.append_withdrawal(from_pot, amount, at).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_withdrawal(&self, id: &RecordId) -> Result<()> {
        if self.is_degraded() || id.is_local() {
            return self.fallback.remove_withdrawal(id).await;
        }
        match self.gateway.delete(Table::Withdrawals, &id.value).await {
            Ok(()) => Ok(()),
            Err(StoreError::Connectivity(reason)) => {
                self.degrade("remove_withdrawal", &reason);
                self.fallback.remove_withdrawal(id).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_withdrawals(
        &self,
        filter: &WithdrawalFilter,
    ) -> Result<(Vec<Withdrawal>, DataSource)> {
        if self.is_degraded() {
            return self.fallback.list_withdrawals(filter).await;
        }
        let fetched = self.gateway.query(&filter.to_query()).await.and_then(|found| {
            found
                .iter()
                .map(rows::withdrawal)
                .collect::<std::result::Result<Vec<_>, _>>()
        });
        match fetched {
            Ok(listing) => Ok((listing, DataSource::Remote)),
            Err(e) => {
                self.read_failed("list_withdrawals", &e);
                self.fallback.list_withdrawals(filter).await
            }
        }
    }
}

impl<R: RemoteStore> KeyStore for ConnectedStore<'_, R> {
    async fn list_keys(&self) -> Result<Vec<ApiKey>> {
        if self.is_degraded() {
            return self.fallback.list_keys().await;
        }
        let query = Query::new(Table::ApiKeys).order_by("created_at", true);
        let fetched = self.gateway.query(&query).await.and_then(|found| {
            found
                .into_iter()
                .map(rows::api_key)
                .collect::<std::result::Result<Vec<_>, _>>()
        });
        match fetched {
            Ok(listing) => self.fallback.remember_keys(listing).await,
            Err(e) => {
                self.read_failed("list_keys", &e);
                self.fallback.list_keys().await
            }
        }
    }

    async fn find_key_by_hash(&self, hash: &str) -> Result<Option<ApiKey>> {
        if self.is_degraded() {
            return self.fallback.find_key_by_hash(hash).await;
        }
        let query = Query::new(Table::ApiKeys)
            .filter(Filter::eq("key_hash", hash))
            .limit(1);
        let fetched = self
            .gateway
            .query(&query)
            .await
            .and_then(|found| found.into_iter().next().map(rows::api_key).transpose());
        match fetched {
            Ok(Some(key)) => {
                self.fallback.remember_key(&key).await?;
                Ok(Some(key))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.read_failed("find_key_by_hash", &e);
                self.fallback.find_key_by_hash(hash).await
            }
        }
    }

    async fn insert_key(&self, key: &ApiKey) -> Result<ApiKey> {
        if self.is_degraded() {
            return self.fallback.insert_key(key).await;
        }
        let inserted = match rows::api_key_row(key) {
            Ok(row) => self
                .gateway
                .insert(Table::ApiKeys, row)
                .await
                .and_then(rows::api_key),
            Err(e) => Err(e),
        };
        match inserted {
            Ok(stored) => {
                self.fallback.remember_key(&stored).await?;
                Ok(stored)
            }
            Err(StoreError::Connectivity(reason)) => {
                self.degrade("insert_key", &reason);
                self.fallback.insert_key(key).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_key(&self, id: &str, patch: &ApiKeyPatch) -> Result<ApiKey> {
        if self.is_degraded() {
            return self.fallback.update_key(id, patch).await;
        }
        let updated = match rows::to_row(patch) {
            Ok(row) => self
                .gateway
                .update(Table::ApiKeys, id, row)
                .await
                .and_then(rows::api_key),
            Err(e) => Err(e),
        };
        match updated {
            Ok(stored) => {
                self.fallback.remember_key(&stored).await?;
                Ok(stored)
            }
            Err(StoreError::Connectivity(reason)) => {
                self.degrade("update_key", &reason);
                self.fallback.update_key(id, patch).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_key(&self, id: &str) -> Result<()> {
        if self.is_degraded() {
            return self.fallback.delete_key(id).await;
        }
        match self.gateway.delete(Table::ApiKeys, id).await {
            Ok(()) => self.fallback.forget_key(id).await,
            Err(StoreError::Connectivity(reason)) => {
                self.degrade("delete_key", &reason);
                self.fallback.delete_key(id).await
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// The store variant chosen by the last probe.
pub enum ActiveStore<'a, R> {
    Connected(ConnectedStore<'a, R>),
    CacheOnly(CacheOnlyStore<'a>),
}

impl<R: RemoteStore> LedgerStore for ActiveStore<'_, R> {
    fn status(&self) -> SyncStatus {
        match self {
            Self::Connected(s) => s.status(),
            Self::CacheOnly(s) => s.status(),
        }
    }

    async fn read_pot(&self, name: &str) -> Result<Option<Pot>> {
        match self {
            Self::Connected(s) => s.read_pot(name).await,
            Self::CacheOnly(s) => s.read_pot(name).await,
        }
    }

    async fn list_pots(&self) -> Result<Vec<Pot>> {
        match self {
            Self::Connected(s) => s.list_pots().await,
            Self::CacheOnly(s) => s.list_pots().await,
        }
    }

    async fn write_pot(&self, pot: &Pot) -> Result<()> {
        match self {
            Self::Connected(s) => s.write_pot(pot).await,
            Self::CacheOnly(s) => s.write_pot(pot).await,
        }
    }

    async fn debit_pot(&self, pot: &Pot, amount: Cents) -> Result<Pot> {
        match self {
            Self::Connected(s) => s.debit_pot(pot, amount).await,
            Self::CacheOnly(s) => s.debit_pot(pot, amount).await,
        }
    }

    async fn create_pot(&self, pot: &Pot) -> Result<Pot> {
        match self {
            Self::Connected(s) => s.create_pot(pot).await,
            Self::CacheOnly(s) => s.create_pot(pot).await,
        }
    }

    async fn append_withdrawal(
        &self,
        from_pot: &str,
        amount: Cents,
        at: &DateTime<Utc>,
    ) -> Result<Withdrawal> {
        match self {
            Self::Connected(s) => s.append_withdrawal(from_pot, amount, at).await,
            Self::CacheOnly(s) => s.append_withdrawal(from_pot, amount, at).await,
        }
    }

    async fn remove_withdrawal(&self, id: &RecordId) -> Result<()> {
        match self {
            Self::Connected(s) => s.remove_withdrawal(id).await,
            Self::CacheOnly(s) => s.remove_withdrawal(id).await,
        }
    }

    async fn list_withdrawals(
        &self,
        filter: &WithdrawalFilter,
    ) -> Result<(Vec<Withdrawal>, DataSource)> {
        match self {
            Self::Connected(s) => s.list_withdrawals(filter).await,
            Self::CacheOnly(s) => s.list_withdrawals(filter).await,
        }
    }
}

impl<R: RemoteStore> KeyStore for ActiveStore<'_, R> {
    async fn list_keys(&self) -> Result<Vec<ApiKey>> {
        match self {
            Self::Connected(s) => s.list_keys().await,
            Self::CacheOnly(s) => s.list_keys().await,
        }
    }

    async fn find_key_by_hash(&self, hash: &str) -> Result<Option<ApiKey>> {
        match self {
            Self::Connected(s) => s.find_key_by_hash(hash).await,
            Self::CacheOnly(s) => s.find_key_by_hash(hash).await,
        }
    }

    async fn insert_key(&self, key: &ApiKey) -> Result<ApiKey> {
        match self {
            Self::Connected(s) => s.insert_key(key).await,
            Self::CacheOnly(s) => s.insert_key(key).await,
        }
    }

    async fn update_key(&self, id: &str, patch: &ApiKeyPatch) -> Result<ApiKey> {
        match self {
            Self::Connected(s) => s.update_key(id, patch).await,
            Self::CacheOnly(s) => s.update_key(id, patch).await,
        }
    }

    async fn delete_key(&self, id: &str) -> Result<()> {
        match self {
            Self::Connected(s) => s.delete_key(id).await,
            Self::CacheOnly(s) => s.delete_key(id).await,
        }
    }
}
