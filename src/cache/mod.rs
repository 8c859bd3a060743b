//! Order cache.
//!
//! [`CachedOrders`] keeps every persisted order in memory behind a
//! reader/writer lock and sits in front of the store as another
//! [`OrdersRepo`](crate::application::repos::OrdersRepo):
//!
//! - warmed from the full store contents at construction
//! - write-through on create, after the store commits
//! - read-through on miss; not-found results are never cached

mod lock;
mod orders;

pub use orders::CachedOrders;
pub(crate) use orders::{
    METRIC_CACHE_ENTRIES, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_WARM_MS,
};
