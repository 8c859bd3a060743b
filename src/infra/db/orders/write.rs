use sqlx::{Postgres, Transaction};
use tracing::warn;

use crate::application::repos::{CreateOutcome, RepoError};
use crate::domain::entities::{Item, Order};
use crate::infra::db::map_sqlx_error;
use crate::infra::db::util::append_csv_row;

use super::super::PostgresRepositories;

const COPY_ITEMS: &str = r#"COPY items (order_uid, position, chrt_id, track_number, price, rid, name, sale, size, total_price, nm_id, brand, status) FROM STDIN WITH (FORMAT CSV, DELIMITER ',', NULL '', QUOTE '"')"#;

const COPY_FLUSH_BYTES: usize = 32 * 1024;

impl PostgresRepositories {
    pub(super) async fn insert_order(&self, order: &Order) -> Result<CreateOutcome, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (
                order_uid, track_number, entry, locale, internal_signature, customer_id,
                delivery_service, shardkey, sm_id, date_created, oof_shard, payment_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (order_uid) DO NOTHING
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shard_key)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .bind(&order.payment.transaction)
        .execute(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(CreateOutcome::AlreadyExists);
        }

        let payment = &order.payment;
        sqlx::query(
            r#"
            INSERT INTO payments (
                transaction, request_id, currency, provider, amount, payment_dt, bank,
                delivery_cost, goods_total, custom_fee
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;

        let delivery = &order.delivery;
        sqlx::query(
            r#"
            INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&order.order_uid)
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .execute(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;

        let copied = copy_items(&mut tx, &order.order_uid, &order.items).await?;
        if copied != order.items.len() as u64 {
            warn!(
                order_uid = %order.order_uid,
                expected = order.items.len(),
                copied,
                "Item bulk load wrote an unexpected number of rows"
            );
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Err(RepoError::integrity(format!(
                "copied {copied} item rows for order `{}`, expected {}",
                order.order_uid,
                order.items.len()
            )));
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(CreateOutcome::Created)
    }
}

/// Bulk-loads items through `COPY` and returns the row count reported by the server.
async fn copy_items(
    tx: &mut Transaction<'_, Postgres>,
    order_uid: &str,
    items: &[Item],
) -> Result<u64, RepoError> {
    if items.is_empty() {
        return Ok(0);
    }

    let mut copy = tx.copy_in_raw(COPY_ITEMS).await.map_err(map_sqlx_error)?;

    let mut buffer = String::with_capacity(COPY_FLUSH_BYTES * 2);
    for (position, item) in items.iter().enumerate() {
        append_item_row(&mut buffer, order_uid, position, item);

        if buffer.len() >= COPY_FLUSH_BYTES {
            copy.send(buffer.as_bytes()).await.map_err(map_sqlx_error)?;
            buffer.clear();
        }
    }

    if !buffer.is_empty() {
        copy.send(buffer.as_bytes()).await.map_err(map_sqlx_error)?;
    }

    copy.finish().await.map_err(map_sqlx_error)
}

fn append_item_row(buffer: &mut String, order_uid: &str, position: usize, item: &Item) {
    let position = position.to_string();
    let chrt_id = item.chrt_id.to_string();
    let price = item.price.to_string();
    let sale = item.sale.to_string();
    let total_price = item.total_price.to_string();
    let nm_id = item.nm_id.to_string();
    let status = item.status.to_string();

    append_csv_row(
        buffer,
        [
            order_uid,
            position.as_str(),
            chrt_id.as_str(),
            item.track_number.as_str(),
            price.as_str(),
            item.rid.as_str(),
            item.name.as_str(),
            sale.as_str(),
            item.size.as_str(),
            total_price.as_str(),
            nm_id.as_str(),
            item.brand.as_str(),
            status.as_str(),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::sample_order;

    #[test]
    fn item_rows_follow_copy_column_order() {
        let order = sample_order("b563feb7b2b84b6test");
        let mut buffer = String::new();
        append_item_row(&mut buffer, &order.order_uid, 0, &order.items[0]);
        assert_eq!(
            buffer,
            "b563feb7b2b84b6test,0,9934930,WBILMTESTTRACK,453,ab4219087a764ae0btest,Mascaras,30,0,317,2389212,Vivienne Sabo,202\n"
        );
    }

    #[test]
    fn empty_text_fields_stay_non_null() {
        let mut item = sample_order("x").items.remove(0);
        item.size = String::new();
        let mut buffer = String::new();
        append_item_row(&mut buffer, "x", 3, &item);
        assert!(buffer.contains(",30,\"\",317,"), "{buffer}");
    }
}
