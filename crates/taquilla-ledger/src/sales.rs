//! Read-only bet and draw feed for reporting.
//!
//! Bets and draw results are owned by the sales side of the system. The
//! back office only reads them, keeping the last successful fetch as a cache
//! snapshot so reports still render while the store is unreachable.

use std::sync::Arc;

use serde::Serialize;
use taquilla_db::queries::snapshots;
use taquilla_store::{rows, Query, RemoteStore, StoreError, Table};
use taquilla_types::{Bet, DrawResult};
use tracing::{debug, warn};

use crate::{now_millis, Backend, DataSource, Result};

/// Bets and draws as of one load.
#[derive(Clone, Debug, Serialize)]
pub struct SalesData {
    pub bets: Vec<Bet>,
    pub draws: Vec<DrawResult>,
    pub source: DataSource,
}

pub struct SalesFeed<R> {
    backend: Arc<Backend<R>>,
}

impl<R: RemoteStore> SalesFeed<R> {
    pub fn new(backend: Arc<Backend<R>>) -> Self {
        Self { backend }
    }

    /// Fetch from the store and refresh the snapshot, or serve the snapshot
    /// if the store cannot be read.
    ///
    /// The feed reads both tables whole, since all-time totals and rankings
    /// need every row, so an unreachable store is detected with one cheap
    /// probe before any of it is requested.
    pub async fn load(&self) -> Result<SalesData> {
        if !self.backend.gateway().is_reachable().await {
            debug!("remote store unavailable, serving cached sales snapshot");
            return self.cached().await;
        }
        match self.fetch().await {
            Ok((bets, draws)) => {
                let conn = self.backend.cache().lock().await;
                let at = now_millis();
                snapshots::write(&conn, snapshots::BETS, &bets, at)?;
                snapshots::write(&conn, snapshots::DRAWS, &draws, at)?;
                debug!(bets = bets.len(), draws = draws.len(), "sales snapshot refreshed");
                Ok(SalesData {
                    bets,
                    draws,
                    source: DataSource::Remote,
                })
            }
            Err(e) => {
                warn!(error = %e, "sales feed unavailable, serving cached snapshot");
                self.cached().await
            }
        }
    }

    /// The last snapshot. Empty if nothing was ever fetched.
    pub async fn cached(&self) -> Result<SalesData> {
        let conn = self.backend.cache().lock().await;
        let bets: Vec<Bet> = snapshots::read(&conn, snapshots::BETS)?.unwrap_or_default();
        let draws: Vec<DrawResult> = snapshots::read(&conn, snapshots::DRAWS)?.unwrap_or_default();
        Ok(SalesData {
            bets,
            draws,
            source: DataSource::Cache,
        })
    }

    async fn fetch(&self) -> std::result::Result<(Vec<Bet>, Vec<DrawResult>), StoreError> {
        let gateway = self.backend.gateway();
        let bets = gateway
            .query(&Query::new(Table::Bets).order_by("timestamp", true))
            .await?
            .into_iter()
            .map(rows::bet)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let draws = gateway
            .query(&Query::new(Table::DrawResults).order_by("draw_time", true))
            .await?
            .into_iter()
            .map(rows::draw_result)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((bets, draws))
    }
}
