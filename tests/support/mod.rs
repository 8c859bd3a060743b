//! In-memory store doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ordervault::application::repos::{CreateOutcome, OrdersRepo, RepoError, StoreHealth};
use ordervault::domain::entities::Order;

/// Order store that keeps committed orders in a map and counts every call.
#[derive(Default)]
pub struct MemoryOrders {
    orders: Mutex<HashMap<String, Order>>,
    pub creates: AtomicUsize,
    pub gets: AtomicUsize,
    pub lists: AtomicUsize,
}

impl MemoryOrders {
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let store = Self::default();
        store.orders.lock().expect("store lock").extend(
            orders
                .into_iter()
                .map(|order| (order.order_uid.clone(), order)),
        );
        store
    }

    pub fn stored(&self, order_uid: &str) -> Option<Order> {
        self.orders.lock().expect("store lock").get(order_uid).cloned()
    }

    pub fn len(&self) -> usize {
        self.orders.lock().expect("store lock").len()
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrdersRepo for MemoryOrders {
    async fn create_order(&self, order: &Order) -> Result<CreateOutcome, RepoError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut orders = self.orders.lock().expect("store lock");
        if orders.contains_key(&order.order_uid) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        orders.insert(order.order_uid.clone(), order.clone());
        Ok(CreateOutcome::Created)
    }

    async fn get_order(&self, order_uid: &str) -> Result<Order, RepoError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.stored(order_uid).ok_or(RepoError::NotFound)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepoError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .orders
            .lock()
            .expect("store lock")
            .values()
            .cloned()
            .collect())
    }
}

/// Health probe with a fixed answer.
pub struct FixedHealth {
    pub healthy: bool,
}

#[async_trait]
impl StoreHealth for FixedHealth {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.healthy {
            Ok(())
        } else {
            Err(RepoError::Timeout)
        }
    }
}
