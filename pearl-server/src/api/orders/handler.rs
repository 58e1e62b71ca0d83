//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::core::ServerState;
use crate::orders::service::OrderListFilter;
use crate::utils::AppResult;
use crate::utils::validation::{
    MAX_ADDRESS_LEN, MAX_NAME_LEN, MAX_NOTE_LEN, MAX_SHORT_TEXT_LEN, validate_optional_text,
    validate_quantity, validate_required_text,
};
use shared::models::{
    Actor, AssignRequest, CheckoutRequest, CheckoutResponse, ClaimRequest, Order, OrderStatus,
    UpdateItemVariantRequest, UpdateStatusRequest,
};

/// Query params for listing orders
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub unassigned: bool,
    pub assignee: Option<String>,
    pub user_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i32,
    #[serde(default)]
    pub offset: i32,
}

fn default_limit() -> i32 {
    50
}

/// POST /api/orders/checkout - 结算下单
pub async fn checkout(
    State(state): State<ServerState>,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    validate_required_text(&payload.user_id, "user_id", MAX_SHORT_TEXT_LEN)?;
    if let Some(address) = &payload.address {
        validate_required_text(&address.full_name, "full_name", MAX_NAME_LEN)?;
        validate_required_text(&address.phone, "phone", MAX_SHORT_TEXT_LEN)?;
        validate_required_text(&address.line1, "line1", MAX_ADDRESS_LEN)?;
        validate_required_text(&address.city, "city", MAX_SHORT_TEXT_LEN)?;
    }
    for item in &payload.items {
        validate_required_text(&item.sku, "sku", MAX_SHORT_TEXT_LEN)?;
        validate_quantity(item.quantity, "quantity")?;
    }

    let resp = state.orders.checkout(payload).await?;
    Ok(Json(resp))
}

/// GET /api/orders - 订单列表 (status / unassigned / assignee 过滤)
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let filter = OrderListFilter {
        status: query.status,
        unassigned: query.unassigned,
        assignee: query.assignee,
        user_id: query.user_id,
        limit: query.limit,
        offset: query.offset,
    };
    let orders = state.orders.list(&filter).await?;
    Ok(Json(orders))
}

/// GET /api/orders/:id - 订单详情
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = state.orders.get(&id).await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/claim - 员工认领
pub async fn claim(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ClaimRequest>,
) -> AppResult<Json<Order>> {
    validate_required_text(&payload.staff_id, "staff_id", MAX_SHORT_TEXT_LEN)?;
    let order = state.orders.claim(&id, &payload.staff_id).await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/assign - 改派
pub async fn assign(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<AssignRequest>,
) -> AppResult<Json<Order>> {
    validate_required_text(&payload.staff_id, "staff_id", MAX_SHORT_TEXT_LEN)?;
    let order = state
        .orders
        .assign(&id, &payload.staff_id, payload.assigned_by.as_deref())
        .await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/status - 状态流转
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<Order>> {
    validate_optional_text(&payload.reason, "reason", MAX_NOTE_LEN)?;
    let actor = Actor {
        id: payload.actor_id.clone(),
        role: payload.actor_role,
    };
    let order = state
        .orders
        .transition(&id, payload.to_status, &actor, payload.reason.as_deref())
        .await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/print - 打印拣货单 (幂等)
pub async fn mark_printed(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ClaimRequest>,
) -> AppResult<Json<Order>> {
    validate_required_text(&payload.staff_id, "staff_id", MAX_SHORT_TEXT_LEN)?;
    let order = state.orders.mark_printed(&id, &payload.staff_id).await?;
    Ok(Json(order))
}

/// PUT /api/orders/:id/items/:idx/variant - 改规格 (仅 PENDING)
pub async fn update_item_variant(
    State(state): State<ServerState>,
    Path((id, idx)): Path<(String, usize)>,
    Json(payload): Json<UpdateItemVariantRequest>,
) -> AppResult<Json<Order>> {
    let order = state.orders.update_item_variant(&id, idx, &payload).await?;
    Ok(Json(order))
}
