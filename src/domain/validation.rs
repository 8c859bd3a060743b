//! Structural and arithmetic validation of order aggregates.
//!
//! Every rule runs on every call; violations are collected rather than
//! short-circuited so callers see the complete list at once.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use time::{OffsetDateTime, macros::datetime};

use crate::domain::codes::{is_currency_code, is_language_code};
use crate::domain::entities::{Delivery, Item, Order, Payment};

static E164: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+[1-9][0-9]{7,14}$").expect("invalid E.164 regex"));

static ZIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{7}$").expect("invalid zip regex"));

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("invalid email regex")
});

const MAX_EMAIL_LEN: usize = 254;
const MAX_EMAIL_LOCAL_LEN: usize = 64;

/// Value of a timestamp that was never set by the producer.
const UNSET_TIMESTAMP: OffsetDateTime = datetime!(0001-01-01 0:00 UTC);

/// Kind of rule a field failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Required,
    Locale,
    Phone,
    Zip,
    Email,
    Currency,
    Min,
    Max,
    AmountMismatch,
    TotalPriceMismatch,
    GoodsTotalMismatch,
}

impl Rule {
    pub fn as_str(self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Locale => "locale",
            Rule::Phone => "phone",
            Rule::Zip => "zip",
            Rule::Email => "email",
            Rule::Currency => "currency",
            Rule::Min => "min",
            Rule::Max => "max",
            Rule::AmountMismatch => "amount_mismatch",
            Rule::TotalPriceMismatch => "total_price_mismatch",
            Rule::GoodsTotalMismatch => "goods_total_mismatch",
        }
    }
}

/// A single failed rule, addressed by its wire field path (`delivery.phone`, `items[0].sale`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub rule: Rule,
    pub message: String,
}

/// Every rule an order failed, in evaluation order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<Violation>);

impl ValidationErrors {
    pub fn violations(&self) -> &[Violation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `field` failed `rule`.
    pub fn has(&self, field: &str, rule: Rule) -> bool {
        self.0
            .iter()
            .any(|violation| violation.field == field && violation.rule == rule)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|violation| violation.field.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order failed {} validation rule(s): ", self.0.len())?;
        for (index, violation) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", violation.field, violation.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validates an order without mutating it.
pub fn validate(order: &Order) -> Result<(), ValidationErrors> {
    let mut checks = Checks::default();

    checks.required("order_uid", &order.order_uid);
    checks.required("track_number", &order.track_number);
    checks.required("entry", &order.entry);

    validate_delivery(&mut checks, &order.delivery);
    validate_payment(&mut checks, &order.payment);

    if order.items.is_empty() {
        checks.push("items", Rule::Required, "at least one item is required");
    }
    for (index, item) in order.items.iter().enumerate() {
        validate_item(&mut checks, index, item);
    }

    if checks.required("locale", &order.locale) && !is_language_code(&order.locale) {
        checks.push(
            "locale",
            Rule::Locale,
            format!("`{}` is not an ISO 639-1 language code", order.locale),
        );
    }
    checks.required("customer_id", &order.customer_id);
    checks.required("delivery_service", &order.delivery_service);
    checks.required("shardkey", &order.shard_key);
    checks.non_zero("sm_id", i64::from(order.sm_id));
    if order.date_created == UNSET_TIMESTAMP {
        checks.push("date_created", Rule::Required, "must be set");
    }
    checks.required("oof_shard", &order.oof_shard);

    let items_total = order
        .items
        .iter()
        .fold(0_i128, |acc, item| acc + i128::from(item.total_price));
    if i128::from(order.payment.goods_total) != items_total {
        checks.push(
            "payment.goods_total",
            Rule::GoodsTotalMismatch,
            format!(
                "goods_total does not match the sum of item total prices: expected {items_total}, got {}",
                order.payment.goods_total
            ),
        );
    }

    checks.finish()
}

fn validate_delivery(checks: &mut Checks, delivery: &Delivery) {
    checks.required("delivery.name", &delivery.name);
    if checks.required("delivery.phone", &delivery.phone) && !E164.is_match(&delivery.phone) {
        checks.push(
            "delivery.phone",
            Rule::Phone,
            "must be an E.164 phone number",
        );
    }
    if checks.required("delivery.zip", &delivery.zip) && !ZIP.is_match(&delivery.zip) {
        checks.push("delivery.zip", Rule::Zip, "must be exactly 7 digits");
    }
    checks.required("delivery.city", &delivery.city);
    checks.required("delivery.address", &delivery.address);
    checks.required("delivery.region", &delivery.region);
    if checks.required("delivery.email", &delivery.email) && !is_email(&delivery.email) {
        checks.push(
            "delivery.email",
            Rule::Email,
            "must be a valid email address",
        );
    }
}

fn validate_payment(checks: &mut Checks, payment: &Payment) {
    checks.required("payment.transaction", &payment.transaction);
    if checks.required("payment.currency", &payment.currency)
        && !is_currency_code(&payment.currency)
    {
        checks.push(
            "payment.currency",
            Rule::Currency,
            format!("`{}` is not an ISO 4217 currency code", payment.currency),
        );
    }
    checks.required("payment.provider", &payment.provider);

    checks.min("payment.amount", payment.amount, 1);
    let expected = i128::from(payment.delivery_cost) + i128::from(payment.goods_total);
    if i128::from(payment.amount) != expected {
        checks.push(
            "payment.amount",
            Rule::AmountMismatch,
            format!(
                "amount does not equal delivery_cost + goods_total: expected {expected}, got {}",
                payment.amount
            ),
        );
    }

    checks.non_zero("payment.payment_dt", payment.payment_dt);
    checks.required("payment.bank", &payment.bank);
    checks.min("payment.delivery_cost", payment.delivery_cost, 0);
    checks.min("payment.custom_fee", payment.custom_fee, 0);
}

fn validate_item(checks: &mut Checks, index: usize, item: &Item) {
    let path = |field: &str| format!("items[{index}].{field}");

    checks.non_zero(path("chrt_id"), item.chrt_id);
    checks.required(path("track_number"), &item.track_number);
    let price_ok = checks.min(path("price"), item.price, 0);
    checks.required(path("rid"), &item.rid);
    checks.required(path("name"), &item.name);
    let sale_ok = checks.min(path("sale"), i64::from(item.sale), 0)
        & checks.max(path("sale"), i64::from(item.sale), 100);
    checks.required(path("size"), &item.size);
    if checks.min(path("total_price"), item.total_price, 0) && price_ok && sale_ok {
        let expected = discounted_total(item.price, item.sale);
        if item.total_price != expected {
            checks.push(
                path("total_price"),
                Rule::TotalPriceMismatch,
                format!(
                    "total_price does not match price and sale: expected {expected}, got {}",
                    item.total_price
                ),
            );
        }
    }
    checks.non_zero(path("nm_id"), item.nm_id);
    checks.required(path("brand"), &item.brand);
    checks.non_zero(path("status"), i64::from(item.status));
}

/// `floor(price * (1 - sale / 100))` in `f64`.
///
/// Producers compute totals in binary floating point, so the expected value
/// follows it: `1585 * (1 - 0.8)` is `316.99999999999994` and floors to 316.
pub fn discounted_total(price: i64, sale: i32) -> i64 {
    let factor = 1.0 - f64::from(sale) / 100.0;
    (price as f64 * factor).floor() as i64
}

fn is_email(value: &str) -> bool {
    if value.len() > MAX_EMAIL_LEN {
        return false;
    }
    match value.split_once('@') {
        Some((local, _)) if local.len() <= MAX_EMAIL_LOCAL_LEN => {
            !local.starts_with('.')
                && !local.ends_with('.')
                && !local.contains("..")
                && EMAIL.is_match(value)
        }
        _ => false,
    }
}

#[derive(Default)]
struct Checks {
    violations: Vec<Violation>,
}

impl Checks {
    fn push(&mut self, field: impl Into<String>, rule: Rule, message: impl Into<String>) {
        self.violations.push(Violation {
            field: field.into(),
            rule,
            message: message.into(),
        });
    }

    /// Records a `Required` violation for empty values; returns whether the value is present.
    fn required(&mut self, field: impl Into<String>, value: &str) -> bool {
        if value.is_empty() {
            self.push(field, Rule::Required, "must not be empty");
            return false;
        }
        true
    }

    fn non_zero(&mut self, field: impl Into<String>, value: i64) -> bool {
        if value == 0 {
            self.push(field, Rule::Required, "must be set");
            return false;
        }
        true
    }

    fn min(&mut self, field: impl Into<String>, value: i64, min: i64) -> bool {
        if value < min {
            self.push(
                field,
                Rule::Min,
                format!("must be at least {min}, got {value}"),
            );
            return false;
        }
        true
    }

    fn max(&mut self, field: impl Into<String>, value: i64, max: i64) -> bool {
        if value > max {
            self.push(
                field,
                Rule::Max,
                format!("must be at most {max}, got {value}"),
            );
            return false;
        }
        true
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.violations))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::sample_order;

    #[test]
    fn reference_order_is_valid() {
        let order = sample_order("b563feb7b2b84b6test");
        assert_eq!(validate(&order), Ok(()));
    }

    #[test]
    fn floor_law_accepts_exact_discount_and_rejects_neighbours() {
        assert_eq!(discounted_total(453, 30), 317);
        assert_eq!(discounted_total(999, 33), 669);
        assert_eq!(discounted_total(100, 100), 0);
        assert_eq!(discounted_total(0, 50), 0);

        let mut order = sample_order("uid-318");
        order.items[0].total_price = 318;
        order.payment.goods_total = 318;
        order.payment.amount = order.payment.delivery_cost + 318;

        let errors = validate(&order).expect_err("318 must be rejected");
        assert_eq!(errors.len(), 1);
        let violation = &errors.violations()[0];
        assert_eq!(violation.field, "items[0].total_price");
        assert_eq!(violation.rule, Rule::TotalPriceMismatch);
        assert!(violation.message.contains("expected 317"), "{}", violation.message);
    }

    #[test]
    fn floor_law_follows_floating_point_products() {
        assert_eq!(discounted_total(1585, 80), 316);
        assert_eq!(discounted_total(10, 90), 0);

        let mut order = sample_order("uid-1585");
        let item = &mut order.items[0];
        item.price = 1585;
        item.sale = 80;
        item.total_price = 316;
        order.payment.goods_total = 316;
        order.payment.amount = order.payment.delivery_cost + 316;
        assert_eq!(validate(&order), Ok(()));

        order.items[0].total_price = 317;
        order.payment.goods_total = 317;
        order.payment.amount = order.payment.delivery_cost + 317;
        let errors = validate(&order).expect_err("317 must be rejected");
        assert!(errors.has("items[0].total_price", Rule::TotalPriceMismatch));
        assert!(errors.to_string().contains("expected 316, got 317"));
    }

    #[test]
    fn floor_law_uses_floor_not_round() {
        let mut order = sample_order("uid-floor");
        let item = &mut order.items[0];
        item.price = 999;
        item.sale = 33;
        item.total_price = 670;
        order.payment.goods_total = 670;
        order.payment.amount = order.payment.delivery_cost + 670;

        let errors = validate(&order).expect_err("rounded total must be rejected");
        assert!(errors.has("items[0].total_price", Rule::TotalPriceMismatch));
    }

    #[test]
    fn goods_total_off_by_one_is_rejected() {
        let mut order = sample_order("uid-goods");
        order.payment.goods_total += 1;
        order.payment.amount += 1;

        let errors = validate(&order).expect_err("goods total mismatch");
        assert_eq!(errors.len(), 1);
        assert!(errors.has("payment.goods_total", Rule::GoodsTotalMismatch));
    }

    #[test]
    fn amount_must_equal_delivery_cost_plus_goods_total() {
        let mut order = sample_order("uid-amount");
        order.payment.amount -= 1;

        let errors = validate(&order).expect_err("amount mismatch");
        assert!(errors.has("payment.amount", Rule::AmountMismatch));
        assert!(errors.to_string().contains("expected 1817, got 1816"));
    }

    #[test]
    fn every_missing_field_is_named() {
        let mut order = sample_order("");
        order.track_number.clear();
        order.entry.clear();
        order.locale.clear();
        order.customer_id.clear();
        order.delivery_service.clear();
        order.shard_key.clear();
        order.oof_shard.clear();
        order.sm_id = 0;
        order.delivery = Delivery::default();
        order.payment.transaction.clear();
        order.payment.currency.clear();
        order.payment.provider.clear();
        order.payment.bank.clear();
        order.payment.payment_dt = 0;
        order.items[0].rid.clear();
        order.items[0].brand.clear();

        let errors = validate(&order).expect_err("missing fields");
        for field in [
            "order_uid",
            "track_number",
            "entry",
            "locale",
            "customer_id",
            "delivery_service",
            "shardkey",
            "oof_shard",
            "sm_id",
            "delivery.name",
            "delivery.phone",
            "delivery.zip",
            "delivery.city",
            "delivery.address",
            "delivery.region",
            "delivery.email",
            "payment.transaction",
            "payment.currency",
            "payment.provider",
            "payment.bank",
            "payment.payment_dt",
            "items[0].rid",
            "items[0].brand",
        ] {
            assert!(errors.has(field, Rule::Required), "missing violation for {field}");
        }
    }

    #[test]
    fn empty_items_are_rejected_alongside_goods_total() {
        let mut order = sample_order("uid-empty");
        order.items.clear();

        let errors = validate(&order).expect_err("no items");
        assert!(errors.has("items", Rule::Required));
        assert!(errors.has("payment.goods_total", Rule::GoodsTotalMismatch));
    }

    #[test]
    fn format_rules_are_reported_independently() {
        let mut order = sample_order("uid-format");
        order.locale = "english".to_string();
        order.delivery.phone = "0720000000".to_string();
        order.delivery.zip = "26398".to_string();
        order.delivery.email = "not-an-email".to_string();
        order.payment.currency = "DOLLAR".to_string();

        let errors = validate(&order).expect_err("format violations");
        assert!(errors.has("locale", Rule::Locale));
        assert!(errors.has("delivery.phone", Rule::Phone));
        assert!(errors.has("delivery.zip", Rule::Zip));
        assert!(errors.has("delivery.email", Rule::Email));
        assert!(errors.has("payment.currency", Rule::Currency));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn negative_amounts_and_out_of_range_sale_are_rejected() {
        let mut order = sample_order("uid-range");
        order.payment.custom_fee = -1;
        order.items[0].sale = 101;

        let errors = validate(&order).expect_err("range violations");
        assert!(errors.has("payment.custom_fee", Rule::Min));
        assert!(errors.has("items[0].sale", Rule::Max));
        assert!(!errors.has("items[0].total_price", Rule::TotalPriceMismatch));
    }

    #[test]
    fn phone_requires_plus_and_subscriber_digits() {
        for phone in ["79001234567", "12", "+12", "+1234567", "+0720000000", "+1234567890123456"] {
            let mut order = sample_order("uid-phone");
            order.delivery.phone = phone.to_string();
            let errors = validate(&order).expect_err(phone);
            assert!(errors.has("delivery.phone", Rule::Phone), "{phone} accepted");
        }

        for phone in ["+9720000000", "+12345678", "+123456789012345"] {
            let mut order = sample_order("uid-phone");
            order.delivery.phone = phone.to_string();
            assert_eq!(validate(&order), Ok(()), "{phone} rejected");
        }
    }

    #[test]
    fn whitespace_only_strings_count_as_present() {
        let mut order = sample_order("uid-blank");
        order.customer_id = " ".to_string();
        order.delivery.region = "\t".to_string();

        assert_eq!(validate(&order), Ok(()));
    }

    #[test]
    fn only_the_zero_time_is_unset() {
        let mut order = sample_order("uid-epoch");
        order.date_created = OffsetDateTime::UNIX_EPOCH;
        assert_eq!(validate(&order), Ok(()));

        order.date_created = datetime!(1969-07-20 20:17 UTC);
        assert_eq!(validate(&order), Ok(()));

        order.date_created = UNSET_TIMESTAMP;
        let errors = validate(&order).expect_err("zero time");
        assert!(errors.has("date_created", Rule::Required));
    }

    #[test]
    fn email_edge_cases() {
        assert!(is_email("test@gmail.com"));
        assert!(is_email("first.last+tag@sub.example.org"));
        assert!(!is_email("test@localhost"));
        assert!(!is_email(".test@gmail.com"));
        assert!(!is_email("te..st@gmail.com"));
        assert!(!is_email("test@@gmail.com"));
    }
}
