//! Reference order documents, used by the `sample` command and by tests.

use time::macros::datetime;

use crate::domain::entities::{Delivery, Item, Order, Payment};

/// Builds the reference order under `order_uid`. The result passes validation
/// whenever `order_uid` is non-empty.
pub fn sample_order(order_uid: &str) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: order_uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![Item {
            chrt_id: 9_934_930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2_389_212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shard_key: "9".to_string(),
        sm_id: 99,
        date_created: datetime!(2021-11-26 06:22:19 UTC),
        oof_shard: "1".to_string(),
    }
}

/// Breaks the item total-price law on the first item while keeping the
/// payment totals consistent, so exactly one rule fails.
pub fn corrupt(order: &mut Order) {
    if let Some(item) = order.items.first_mut() {
        item.total_price += 1;
        order.payment.goods_total += 1;
        order.payment.amount += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::{Rule, validate};

    #[test]
    fn corrupted_sample_fails_exactly_one_rule() {
        let mut order = sample_order("corrupted");
        corrupt(&mut order);

        let errors = validate(&order).expect_err("corrupted order");
        assert_eq!(errors.len(), 1);
        assert!(errors.has("items[0].total_price", Rule::TotalPriceMismatch));
    }
}
