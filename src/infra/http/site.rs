//! HTML lookup page.

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use super::{HttpState, repo_error_to_http};
use crate::application::repos::RepoError;
use crate::presentation::views::{
    OrderPageTemplate, OrderPageView, render_order_not_found, render_template_response,
};

const SOURCE: &str = "infra::http::site::order_page";

pub(super) fn router() -> Router<HttpState> {
    Router::new().route("/site/order", get(order_page))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrderQuery {
    order_uid: Option<String>,
}

async fn order_page(State(state): State<HttpState>, Query(query): Query<OrderQuery>) -> Response {
    let order_uid = query
        .order_uid
        .as_deref()
        .map(str::trim)
        .filter(|uid| !uid.is_empty());

    let Some(order_uid) = order_uid else {
        return render_template_response(
            OrderPageTemplate {
                view: OrderPageView::empty(),
            },
            StatusCode::OK,
        );
    };

    match state.orders.get_order(order_uid).await {
        Ok(order) => render_template_response(
            OrderPageTemplate {
                view: OrderPageView::found(order),
            },
            StatusCode::OK,
        ),
        Err(RepoError::NotFound) => render_order_not_found(order_uid),
        Err(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}
