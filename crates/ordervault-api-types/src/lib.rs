//! Wire shapes of the order aggregate.
//!
//! These types mirror the JSON documents delivered by the ingress stream and
//! returned by the lookup endpoint. Scalar fields fall back to their empty or
//! zero value when absent so that validation can name every missing field;
//! the nested `delivery` and `payment` objects and `date_created` are required
//! at decode time.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Aggregate root: one order with its delivery, payment and line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub order_uid: String,
    #[serde(default)]
    pub track_number: String,
    #[serde(default)]
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub delivery_service: String,
    #[serde(default, rename = "shardkey")]
    pub shard_key: String,
    #[serde(default)]
    pub sm_id: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub date_created: OffsetDateTime,
    #[serde(default)]
    pub oof_shard: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Payment attached to an order. Amounts are expressed in minor currency units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// Payment time as epoch seconds.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(default)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    /// Discount percentage in `0..=100`.
    pub sale: i32,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "order_uid": "b563feb7b2b84b6test",
        "track_number": "WBILMTESTTRACK",
        "entry": "WBIL",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "zip": "2639809",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15",
            "region": "Kraiot",
            "email": "test@gmail.com"
        },
        "payment": {
            "transaction": "b563feb7b2b84b6test",
            "request_id": "",
            "currency": "USD",
            "provider": "wbpay",
            "amount": 1817,
            "payment_dt": 1637907727,
            "bank": "alpha",
            "delivery_cost": 1500,
            "goods_total": 317,
            "custom_fee": 0
        },
        "items": [{
            "chrt_id": 9934930,
            "track_number": "WBILMTESTTRACK",
            "price": 453,
            "rid": "ab4219087a764ae0btest",
            "name": "Mascaras",
            "sale": 30,
            "size": "0",
            "total_price": 317,
            "nm_id": 2389212,
            "brand": "Vivienne Sabo",
            "status": 202
        }],
        "locale": "en",
        "internal_signature": "",
        "customer_id": "test",
        "delivery_service": "meest",
        "shardkey": "9",
        "sm_id": 99,
        "date_created": "2021-11-26T06:22:19Z",
        "oof_shard": "1"
    }"#;

    #[test]
    fn decodes_reference_document() {
        let order: Order = serde_json::from_str(SAMPLE).expect("decode sample");
        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.shard_key, "9");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].total_price, 317);
        assert_eq!(order.date_created.unix_timestamp(), 1_637_907_739);
    }

    #[test]
    fn encodes_wire_field_names() {
        let order: Order = serde_json::from_str(SAMPLE).expect("decode sample");
        let value = serde_json::to_value(&order).expect("encode");
        assert!(value.get("shardkey").is_some());
        assert!(value.get("shard_key").is_none());
        assert_eq!(value["date_created"], "2021-11-26T06:22:19Z");
    }

    #[test]
    fn missing_scalars_default_but_delivery_is_required() {
        let partial = r#"{
            "delivery": {},
            "payment": {},
            "date_created": "2021-11-26T06:22:19Z"
        }"#;
        let order: Order = serde_json::from_str(partial).expect("decode partial");
        assert!(order.order_uid.is_empty());
        assert!(order.items.is_empty());

        let missing = r#"{ "payment": {}, "date_created": "2021-11-26T06:22:19Z" }"#;
        let err = serde_json::from_str::<Order>(missing).expect_err("delivery required");
        assert!(err.to_string().contains("delivery"));
    }
}
