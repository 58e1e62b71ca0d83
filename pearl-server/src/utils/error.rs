//! 统一错误处理
//!
//! 提供应用级错误类型和响应结构：
//! - [`AppError`] - 应用错误枚举
//! - [`AppResponse`] - API 响应结构
//!
//! # 错误码规范
//!
//! | 前缀 | 分类 | 示例 |
//! |------|------|------|
//! | E0xxx | 通用业务错误 | E0002 验证失败 |
//! | E1xxx | 订单域错误 | E1001 库存不足 |
//! | E9xxx | 系统错误 | E9002 数据库错误 |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use shared::models::OrderStatus;
use tracing::error;

use crate::db::repository::RepoError;

/// API 统一响应结构
///
/// ```json
/// {
///   "code": "E0000",
///   "message": "Success",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    /// 错误码 (E0000 表示成功)
    pub code: String,
    /// 消息
    pub message: String,
    /// 响应数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// 应用错误枚举
///
/// 订单域的错误分类与传播策略见各服务模块：库存不足中止整个结算，
/// 员工分配失败只记日志，金额不匹配按欺诈信号处理且不改变订单状态。
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== 通用业务错误 (4xx) ==========
    #[error("Resource not found: {0}")]
    /// 资源不存在 (404)
    NotFound(String),

    #[error("Validation failed: {0}")]
    /// 验证失败 (400)
    Validation(String),

    // ========== 订单域错误 ==========
    #[error("Out of stock: {sku}")]
    /// 库存不足，命名第一个扣减失败的 SKU (409)
    OutOfStock { sku: String },

    #[error("Invalid transition: {from} -> {to}")]
    /// 状态机拒绝该转换边 (422)
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order already assigned: {0}")]
    /// 订单已被其他员工认领 (409)
    AlreadyAssigned(String),

    #[error("Wrong state: {0}")]
    /// 条件写失败，调用方需重读当前状态 (409)
    WrongState(String),

    #[error("Payment provider error: {0}")]
    /// 支付链接创建/取消失败 (502)
    PaymentProvider(String),

    #[error("Payment amount mismatch: expected {expected}, got {got}")]
    /// Webhook 金额与订单总额不符，按篡改/重放处理 (422)
    AmountMismatch { expected: i64, got: i64 },

    // ========== 系统错误 (5xx) ==========
    #[error("Database error: {0}")]
    /// 数据库错误 (500)
    Database(String),

    #[error("Internal server error: {0}")]
    /// 内部错误 (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "E0003", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "E0002", msg.clone()),

            AppError::OutOfStock { .. } => (StatusCode::CONFLICT, "E1001", self.to_string()),
            AppError::InvalidTransition { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "E1002", self.to_string())
            }
            AppError::AlreadyAssigned(msg) => (StatusCode::CONFLICT, "E1003", msg.clone()),
            AppError::WrongState(msg) => (StatusCode::CONFLICT, "E1004", msg.clone()),
            AppError::PaymentProvider(msg) => {
                error!(target: "payment", error = %msg, "Payment provider call failed");
                (StatusCode::BAD_GATEWAY, "E1005", "Payment provider error".to_string())
            }
            AppError::AmountMismatch { .. } => {
                // 不向外暴露期望金额
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "E1006",
                    "Payment amount mismatch".to_string(),
                )
            }

            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9002",
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9001",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(AppResponse::<()> {
            code: code.to_string(),
            message,
            data: None,
        });

        (status, body).into_response()
    }
}

// ========== Helper Constructors ==========

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn payment_provider(msg: impl Into<String>) -> Self {
        Self::PaymentProvider(msg.into())
    }

    pub fn wrong_state(msg: impl Into<String>) -> Self {
        Self::WrongState(msg.into())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::NotFound(msg),
            RepoError::Duplicate(msg) => AppError::Validation(msg),
            RepoError::Validation(msg) => AppError::Validation(msg),
            RepoError::Database(msg) => AppError::Database(msg),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

// ========== Helper functions ==========

/// Create a successful response
pub fn ok<T: Serialize>(data: T) -> Json<AppResponse<T>> {
    Json(AppResponse {
        code: "E0000".to_string(),
        message: "Success".to_string(),
        data: Some(data),
    })
}
