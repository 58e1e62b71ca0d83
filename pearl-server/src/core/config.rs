use chrono_tz::Tz;

use crate::payment::GatewayConfig;
use crate::scheduler::SweepConfig;

/// 服务器配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/pearl | 工作目录 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | BUSINESS_TIMEZONE | Asia/Ho_Chi_Minh | 业务时区 (班次窗口) |
/// | PAYMENT_BASE_URL | https://api-merchant.payos.vn | 支付网关地址 |
/// | PAYMENT_CLIENT_ID / PAYMENT_API_KEY / PAYMENT_CHECKSUM_KEY | - | 网关凭证 |
/// | PAYMENT_RETURN_URL / PAYMENT_CANCEL_URL | - | 托管页回跳地址 |
/// | PAYMENT_TIMEOUT_MS | 10000 | 网关调用超时(毫秒) |
/// | SWEEP_INTERVAL_SECS | 300 | 清扫间隔(秒) |
/// | UNPAID_EXPIRY_HOURS | 24 | 未付订单过期时限 |
/// | PENDING_CONFIRM_HOURS | 12 | 滞留订单自动确认时限 |
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 业务时区
    pub timezone: Tz,
    /// 支付网关配置
    pub gateway: GatewayConfig,
    /// 清扫调度配置
    pub sweep: SweepConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        let timezone = env_or("BUSINESS_TIMEZONE", "Asia/Ho_Chi_Minh")
            .parse()
            .unwrap_or(chrono_tz::Asia::Ho_Chi_Minh);

        Self {
            work_dir: env_or("WORK_DIR", "/var/lib/pearl"),
            http_port: env_parse("HTTP_PORT", 3000),
            environment: env_or("ENVIRONMENT", "development"),
            timezone,
            gateway: GatewayConfig {
                base_url: env_or("PAYMENT_BASE_URL", "https://api-merchant.payos.vn"),
                client_id: env_or("PAYMENT_CLIENT_ID", ""),
                api_key: env_or("PAYMENT_API_KEY", ""),
                checksum_key: env_or("PAYMENT_CHECKSUM_KEY", ""),
                return_url: env_or("PAYMENT_RETURN_URL", "http://localhost:5173/payment/return"),
                cancel_url: env_or("PAYMENT_CANCEL_URL", "http://localhost:5173/payment/cancel"),
                timeout_ms: env_parse("PAYMENT_TIMEOUT_MS", 10_000),
            },
            sweep: SweepConfig {
                interval_secs: env_parse("SWEEP_INTERVAL_SECS", 300),
                unpaid_expiry_hours: env_parse("UNPAID_EXPIRY_HOURS", 24),
                pending_confirm_hours: env_parse("PENDING_CONFIRM_HOURS", 12),
            },
        }
    }

    /// 数据库文件路径 (work_dir/database/pearl.db)
    pub fn database_path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(&self.work_dir)
            .join("database")
            .join("pearl.db")
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        let base = std::path::PathBuf::from(&self.work_dir);
        std::fs::create_dir_all(base.join("database"))?;
        std::fs::create_dir_all(base.join("logs"))?;
        Ok(())
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
