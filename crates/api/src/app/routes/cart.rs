use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use storefront_core::{CartItemId, ProductId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:id", put(update_item).delete(remove_item))
        .route("/merge", post(merge_cart))
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<crate::context::UserContext>,
) -> axum::response::Response {
    match services.get_current_cart(user.user_id()).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<crate::context::UserContext>,
    Json(body): Json<dto::AddItemRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match body.product_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "invalid product id",
            );
        }
    };

    match services
        .add_item(user.user_id(), product_id, body.quantity)
        .await
    {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<crate::context::UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateQuantityRequest>,
) -> axum::response::Response {
    let item_id: CartItemId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "invalid item id",
            );
        }
    };

    match services
        .update_item_quantity(user.user_id(), item_id, body.quantity)
        .await
    {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<crate::context::UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: CartItemId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "invalid item id",
            );
        }
    };

    match services.remove_item(user.user_id(), item_id).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<crate::context::UserContext>,
) -> axum::response::Response {
    match services.clear_cart(user.user_id()).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn merge_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<crate::context::UserContext>,
    Json(body): Json<dto::MergeCartRequest>,
) -> axum::response::Response {
    let guest_lines = match dto::to_guest_lines(&body.items) {
        Ok(v) => v,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
    };

    match services.merge_guest_cart(user.user_id(), &guest_lines).await {
        Ok((summary, snapshot)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "merged": summary.merged,
                "skipped": summary.skipped,
                "cart": snapshot,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
