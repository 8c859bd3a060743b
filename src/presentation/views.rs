use crate::application::error::{ErrorReport, HttpError};
use crate::domain::entities::Order;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub struct OrderView {
    pub order: Order,
    pub created_at: String,
    pub paid_at: String,
}

impl OrderView {
    pub fn new(order: Order) -> Self {
        let created_at = order
            .date_created
            .format(&Rfc3339)
            .unwrap_or_else(|_| order.date_created.to_string());
        let paid_at = OffsetDateTime::from_unix_timestamp(order.payment.payment_dt)
            .ok()
            .and_then(|at| at.format(&Rfc3339).ok())
            .unwrap_or_else(|| order.payment.payment_dt.to_string());
        Self {
            order,
            created_at,
            paid_at,
        }
    }
}

/// Lookup page state: the submitted identifier plus either an order or a notice.
pub struct OrderPageView {
    pub query: String,
    pub order: Option<OrderView>,
    pub notice: Option<String>,
}

impl OrderPageView {
    pub fn empty() -> Self {
        Self {
            query: String::new(),
            order: None,
            notice: None,
        }
    }

    pub fn found(order: Order) -> Self {
        Self {
            query: order.order_uid.clone(),
            order: Some(OrderView::new(order)),
            notice: None,
        }
    }

    pub fn not_found(order_uid: &str) -> Self {
        Self {
            query: order_uid.to_string(),
            order: None,
            notice: Some(format!("No order with order_uid `{order_uid}`.")),
        }
    }
}

#[derive(Template)]
#[template(path = "order.html")]
pub struct OrderPageTemplate {
    pub view: OrderPageView,
}

pub fn render_order_not_found(order_uid: &str) -> Response {
    let mut response = render_template_response(
        OrderPageTemplate {
            view: OrderPageView::not_found(order_uid),
        },
        StatusCode::NOT_FOUND,
    );
    ErrorReport::from_message(
        "presentation::views::render_order_not_found",
        StatusCode::NOT_FOUND,
        format!("order `{order_uid}` not found"),
    )
    .attach(&mut response);
    response
}
