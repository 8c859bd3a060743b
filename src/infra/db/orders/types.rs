use time::OffsetDateTime;

use crate::domain::entities::{Delivery, Item, Order, Payment};

/// Header joined with its delivery and payment; items are loaded separately.
#[derive(sqlx::FromRow)]
pub(crate) struct OrderRow {
    pub(crate) order_uid: String,
    pub(crate) track_number: String,
    pub(crate) entry: String,
    pub(crate) locale: String,
    pub(crate) internal_signature: String,
    pub(crate) customer_id: String,
    pub(crate) delivery_service: String,
    pub(crate) shardkey: String,
    pub(crate) sm_id: i32,
    pub(crate) date_created: OffsetDateTime,
    pub(crate) oof_shard: String,
    pub(crate) delivery_name: String,
    pub(crate) delivery_phone: String,
    pub(crate) delivery_zip: String,
    pub(crate) delivery_city: String,
    pub(crate) delivery_address: String,
    pub(crate) delivery_region: String,
    pub(crate) delivery_email: String,
    pub(crate) payment_transaction: String,
    pub(crate) payment_request_id: String,
    pub(crate) payment_currency: String,
    pub(crate) payment_provider: String,
    pub(crate) payment_amount: i64,
    pub(crate) payment_dt: i64,
    pub(crate) payment_bank: String,
    pub(crate) payment_delivery_cost: i64,
    pub(crate) payment_goods_total: i64,
    pub(crate) payment_custom_fee: i64,
}

impl OrderRow {
    pub(crate) fn into_order(self, items: Vec<Item>) -> Order {
        Order {
            order_uid: self.order_uid,
            track_number: self.track_number,
            entry: self.entry,
            delivery: Delivery {
                name: self.delivery_name,
                phone: self.delivery_phone,
                zip: self.delivery_zip,
                city: self.delivery_city,
                address: self.delivery_address,
                region: self.delivery_region,
                email: self.delivery_email,
            },
            payment: Payment {
                transaction: self.payment_transaction,
                request_id: self.payment_request_id,
                currency: self.payment_currency,
                provider: self.payment_provider,
                amount: self.payment_amount,
                payment_dt: self.payment_dt,
                bank: self.payment_bank,
                delivery_cost: self.payment_delivery_cost,
                goods_total: self.payment_goods_total,
                custom_fee: self.payment_custom_fee,
            },
            items,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shard_key: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

/// Item row tagged with its owning order, for bulk reads.
#[derive(sqlx::FromRow)]
pub(crate) struct OwnedItemRow {
    pub(crate) order_uid: String,
    #[sqlx(flatten)]
    pub(crate) item: Item,
}
