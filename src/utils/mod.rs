//! 工具模块
//!
//! 包含错误类型、ID 生成与日志系统。

pub mod error;
pub mod id;
pub mod logger;

// 重导出常用类型
pub use error::{error_code, status_code, Result, RouteError};
pub use id::{generate_request_id, is_valid_listener_id, ListenerId};
pub use logger::{LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};
