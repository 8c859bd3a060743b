mod read;
mod types;
mod write;

use async_trait::async_trait;

use crate::application::repos::{CreateOutcome, OrdersRepo, RepoError};
use crate::domain::entities::Order;

use super::PostgresRepositories;

#[async_trait]
impl OrdersRepo for PostgresRepositories {
    async fn create_order(&self, order: &Order) -> Result<CreateOutcome, RepoError> {
        self.insert_order(order).await
    }

    async fn get_order(&self, order_uid: &str) -> Result<Order, RepoError> {
        self.find_order(order_uid).await
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepoError> {
        self.load_all_orders().await
    }
}
