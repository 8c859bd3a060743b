use std::collections::HashMap;

use crate::application::repos::RepoError;
use crate::domain::entities::{Item, Order};
use crate::infra::db::map_sqlx_error;

use super::super::PostgresRepositories;
use super::types::{OrderRow, OwnedItemRow};

const ORDER_SELECT: &str = r#"
    SELECT o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature,
           o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created, o.oof_shard,
           d.name AS delivery_name, d.phone AS delivery_phone, d.zip AS delivery_zip,
           d.city AS delivery_city, d.address AS delivery_address,
           d.region AS delivery_region, d.email AS delivery_email,
           p.transaction AS payment_transaction, p.request_id AS payment_request_id,
           p.currency AS payment_currency, p.provider AS payment_provider,
           p.amount AS payment_amount, p.payment_dt AS payment_dt, p.bank AS payment_bank,
           p.delivery_cost AS payment_delivery_cost, p.goods_total AS payment_goods_total,
           p.custom_fee AS payment_custom_fee
    FROM orders o
    INNER JOIN deliveries d ON d.order_uid = o.order_uid
    INNER JOIN payments p ON p.transaction = o.payment_id
"#;

const ITEM_COLUMNS: &str =
    "chrt_id, track_number, price, rid, name, sale, size, total_price, nm_id, brand, status";

impl PostgresRepositories {
    pub(super) async fn find_order(&self, order_uid: &str) -> Result<Order, RepoError> {
        let header = sqlx::query_as::<_, OrderRow>(&format!(
            "{ORDER_SELECT} WHERE o.order_uid = $1"
        ))
        .bind(order_uid)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE order_uid = $1 ORDER BY position"
        ))
        .bind(order_uid)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(header.into_order(items))
    }

    pub(super) async fn load_all_orders(&self) -> Result<Vec<Order>, RepoError> {
        let headers = sqlx::query_as::<_, OrderRow>(&format!(
            "{ORDER_SELECT} ORDER BY o.date_created, o.order_uid"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, OwnedItemRow>(&format!(
            "SELECT order_uid, {ITEM_COLUMNS} FROM items ORDER BY order_uid, position"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut items_by_order: HashMap<String, Vec<Item>> = HashMap::new();
        for row in rows {
            items_by_order
                .entry(row.order_uid)
                .or_default()
                .push(row.item);
        }

        Ok(headers
            .into_iter()
            .map(|header| {
                let items = items_by_order.remove(&header.order_uid).unwrap_or_default();
                header.into_order(items)
            })
            .collect())
    }
}
