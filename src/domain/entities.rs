//! The order aggregate. Wire and domain shapes are shared with API clients.

pub use ordervault_api_types::{Delivery, Item, Order, Payment};
