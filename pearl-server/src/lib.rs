//! Pearl Commerce Server - 订单生命周期编排服务
//!
//! # 架构概述
//!
//! 本模块是订单服务的主入口，提供以下核心功能：
//!
//! - **库存台账** (`inventory`): 按 SKU 的原子条件扣减/回补
//! - **支付网关** (`payment`): 托管支付链接、HMAC 签名校验、状态轮询
//! - **订单编排** (`orders`): 结算、状态机、员工认领与改派
//! - **后台清扫** (`scheduler`): 超时未付自动取消、滞留订单自动确认
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! pearl-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── db/            # SQLite 连接池与 repository
//! ├── inventory/     # 库存台账
//! ├── payment/       # 支付网关适配器
//! ├── orders/        # 订单聚合与生命周期服务
//! ├── assignment/    # 员工分配均衡器
//! ├── scheduler.rs   # 订单清扫调度器
//! ├── events.rs      # 生命周期事件总线
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 工具函数
//! ```

pub mod api;
pub mod assignment;
pub mod core;
pub mod db;
pub mod events;
pub mod inventory;
pub mod orders;
pub mod payment;
pub mod scheduler;
pub mod utils;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use crate::orders::OrderService;
pub use crate::utils::{AppError, AppResult};

// Re-export logger functions
pub use crate::utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境 (dotenv + 日志)
pub fn setup_environment() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    ____                  __
   / __ \___  ____ ______/ /
  / /_/ / _ \/ __ `/ ___/ /
 / ____/  __/ /_/ / /  / /
/_/    \___/\__,_/_/  /_/
    "#
    );
}
