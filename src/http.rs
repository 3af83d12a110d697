//! HTTP surface for the order service.
//!
//! Identity is resolved upstream; handlers trust the `x-user-id` header the
//! gateway injects.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::{NewProduct, ProductUpdate};
use crate::error::OrderError;
use crate::service::{CatalogService, LineRequest, OrderService};
use crate::store::Storage;

pub struct AppState<S: Storage> {
    pub orders: Arc<OrderService<S>>,
    pub catalog: Arc<CatalogService<S>>,
}

impl<S: Storage> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

pub fn router<S: Storage>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/products", post(create_product::<S>))
        .route(
            "/api/v1/products/:id",
            get(get_product::<S>).put(update_product::<S>),
        )
        .route("/api/v1/orders", get(list_orders::<S>).post(place_order::<S>))
        .route("/api/v1/orders/:id", get(get_order::<S>))
        .route("/api/v1/orders/:id/cancel", post(cancel_order::<S>))
        .with_state(state)
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let status = match &self {
            OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            OrderError::InsufficientStock { .. } | OrderError::InvalidState => StatusCode::CONFLICT,
            OrderError::InvalidQuantity { .. } | OrderError::EmptyOrder => StatusCode::BAD_REQUEST,
            OrderError::Forbidden => StatusCode::FORBIDDEN,
            OrderError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "storage failure");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn user_id(headers: &HeaderMap) -> Result<Uuid, Response> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "missing or invalid x-user-id header" })),
            )
                .into_response()
        })
}

fn validation_error(err: validator::ValidationErrors) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "service": "storefront-orders" }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub stock: i32,
}

async fn create_product<S: Storage>(
    State(state): State<AppState<S>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<Response, Response> {
    req.validate().map_err(validation_error)?;
    let product = state
        .catalog
        .create_product(NewProduct {
            name: req.name,
            description: req.description,
            price: req.price,
            stock: req.stock,
        })
        .await
        .map_err(IntoResponse::into_response)?;
    Ok((StatusCode::CREATED, Json(product)).into_response())
}

async fn get_product<S: Storage>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
) -> Result<Response, Response> {
    let product = state
        .catalog
        .get_product(id)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(product).into_response())
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
}

async fn update_product<S: Storage>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Response, Response> {
    req.validate().map_err(validation_error)?;
    let product = state
        .catalog
        .update_product(
            id,
            ProductUpdate {
                name: req.name,
                description: req.description,
                price: req.price,
                stock: req.stock,
            },
        )
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(product).into_response())
}

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

async fn place_order<S: Storage>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<Response, Response> {
    let user_id = user_id(&headers)?;
    req.validate().map_err(validation_error)?;
    let items: Vec<LineRequest> = req
        .items
        .iter()
        .map(|item| LineRequest {
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect();
    let receipt = state
        .orders
        .place_order(user_id, &items)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok((StatusCode::CREATED, Json(receipt)).into_response())
}

async fn list_orders<S: Storage>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Result<Response, Response> {
    let user_id = user_id(&headers)?;
    let orders = state
        .orders
        .user_orders(user_id)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(orders).into_response())
}

async fn get_order<S: Storage>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, Response> {
    let user_id = user_id(&headers)?;
    let order = state
        .orders
        .get_order(id, user_id)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(order).into_response())
}

async fn cancel_order<S: Storage>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, Response> {
    let user_id = user_id(&headers)?;
    state
        .orders
        .cancel_order(id, user_id)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(serde_json::json!({ "cancelled": true })).into_response())
}
