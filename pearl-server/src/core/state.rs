use std::sync::Arc;

use sqlx::SqlitePool;

use crate::core::config::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::db::DbService;
use crate::events::EventHub;
use crate::orders::OrderService;
use crate::payment::Gateway;
use crate::scheduler::OrderScheduler;
use crate::utils::AppResult;

/// 服务器状态 - 持有所有服务的共享引用
///
/// 使用 Arc/连接池实现浅拷贝，所有权成本极低。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | pool | SQLite 连接池 |
/// | hub | 生命周期事件总线 |
/// | orders | 订单生命周期服务 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// SQLite 连接池
    pub pool: SqlitePool,
    /// 生命周期事件总线
    pub hub: Arc<EventHub>,
    /// 订单生命周期服务
    pub orders: OrderService,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/pearl.db)
    /// 3. 事件总线、支付网关、订单服务
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        config
            .ensure_work_dir_structure()
            .map_err(|e| crate::utils::AppError::internal(format!("work dir setup failed: {e}")))?;

        let db_path = config.database_path();
        let db = DbService::new(&db_path.to_string_lossy()).await?;

        let hub = Arc::new(EventHub::new());
        let gateway = Arc::new(Gateway::new(config.gateway.clone()));
        let orders = OrderService::new(db.pool.clone(), gateway, hub.clone(), config.timezone);

        Ok(Self {
            config: config.clone(),
            pool: db.pool,
            hub,
            orders,
        })
    }

    /// 启动后台任务
    ///
    /// 必须在 `Server::run()` 中、HTTP 服务之前调用。
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let scheduler = OrderScheduler::new(
            self.orders.clone(),
            self.config.sweep.clone(),
            tasks.shutdown_token(),
        );
        tasks.spawn("order_scheduler", TaskKind::Periodic, scheduler.run());
    }
}
