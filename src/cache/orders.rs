//! Cache-aside layer over an order store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, gauge, histogram};
use tracing::{debug, info};

use crate::application::repos::{CreateOutcome, OrdersRepo, RepoError};
use crate::domain::entities::Order;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::orders";

pub(crate) const METRIC_CACHE_HIT: &str = "ordervault_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "ordervault_cache_miss_total";
pub(crate) const METRIC_CACHE_ENTRIES: &str = "ordervault_cache_entries";
pub(crate) const METRIC_CACHE_WARM_MS: &str = "ordervault_cache_warm_ms";

/// In-memory mirror of persisted orders, keyed by `order_uid`.
///
/// Entries are only ever inserted after the backing store confirmed the order,
/// either by committing a create or by returning it from a lookup. Nothing is
/// evicted for the lifetime of the instance.
pub struct CachedOrders {
    store: Arc<dyn OrdersRepo>,
    entries: RwLock<HashMap<String, Order>>,
}

impl CachedOrders {
    /// Loads every stored order before returning. Fails if the bulk load fails,
    /// so callers never serve from a partially warmed cache.
    pub async fn load(store: Arc<dyn OrdersRepo>) -> Result<Self, RepoError> {
        let started_at = Instant::now();
        let orders = store.list_orders().await?;

        let entries: HashMap<String, Order> = orders
            .into_iter()
            .map(|order| (order.order_uid.clone(), order))
            .collect();
        let count = entries.len();

        histogram!(METRIC_CACHE_WARM_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        gauge!(METRIC_CACHE_ENTRIES).set(count as f64);
        info!(
            orders = count,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Order cache warmed"
        );

        Ok(Self {
            store,
            entries: RwLock::new(entries),
        })
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, order_uid: &str) -> bool {
        rw_read(&self.entries, SOURCE, "contains").contains_key(order_uid)
    }

    fn lookup(&self, order_uid: &str) -> Option<Order> {
        rw_read(&self.entries, SOURCE, "lookup")
            .get(order_uid)
            .cloned()
    }

    fn insert(&self, order: Order) {
        let count = {
            let mut entries = rw_write(&self.entries, SOURCE, "insert");
            entries.insert(order.order_uid.clone(), order);
            entries.len()
        };
        gauge!(METRIC_CACHE_ENTRIES).set(count as f64);
    }

    /// Inserts unless a concurrent writer got there first.
    fn fill(&self, order: &Order) {
        let count = {
            let mut entries = rw_write(&self.entries, SOURCE, "fill");
            if entries.contains_key(&order.order_uid) {
                return;
            }
            entries.insert(order.order_uid.clone(), order.clone());
            entries.len()
        };
        gauge!(METRIC_CACHE_ENTRIES).set(count as f64);
    }
}

#[async_trait]
impl OrdersRepo for CachedOrders {
    async fn create_order(&self, order: &Order) -> Result<CreateOutcome, RepoError> {
        let outcome = self.store.create_order(order).await?;
        match outcome {
            CreateOutcome::Created => self.insert(order.clone()),
            CreateOutcome::AlreadyExists => {
                debug!(
                    order_uid = %order.order_uid,
                    "Duplicate create left cached order untouched"
                );
            }
        }
        Ok(outcome)
    }

    async fn get_order(&self, order_uid: &str) -> Result<Order, RepoError> {
        if let Some(order) = self.lookup(order_uid) {
            counter!(METRIC_CACHE_HIT).increment(1);
            return Ok(order);
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        let order = self.store.get_order(order_uid).await?;
        self.fill(&order);
        Ok(order)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepoError> {
        self.store.list_orders().await
    }
}
