//! 核心模块
//!
//! 包含路由系统配置。

pub mod config;

pub use config::{
    HostConfig, LogConfig, RouteDefinition, RouterSettings, RouterSettingsBuilder,
    DEFAULT_REWRITE_PREFIX,
};
