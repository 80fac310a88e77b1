//! # Plain Routes - 路由注册与分发适配器
//!
//! 把一条重写规则和一组回调绑定成路由，嵌入到基于钩子的宿主中：
//!
//! - **路由注册**: 向宿主贡献重写规则和需要识别的查询参数
//! - **请求匹配**: 宿主匹配到的规则与路由模式相等时，把回调接入固定的生命周期阶段
//! - **模板短路**: `template` 阶段直接渲染路由自己的模板并终止请求
//! - **钩子注册表**: 按优先级和参数个数分发动作与过滤器，每个请求使用独立作用域
//! - **参考宿主**: 路径解析、查询参数过滤和生命周期驱动
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use plain_routes::{CallbackBundle, PlainRoutes, RouterSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let routes = PlainRoutes::new(RouterSettings::default()).await?;
//!
//!     let bundle = CallbackBundle::builder().template("stripe.php").build()?;
//!     routes.add_route("stripe(/)?", bundle, vec![]).await?;
//!
//!     let response = routes.handle("/stripe").await?;
//!     println!("{:?}", response.body);
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `router` - 路由、回调包、生命周期阶段和钩子注册表
//! - `host` - 参考宿主：重写规则表、模板定位、请求运行时
//! - `core` - 配置
//! - `utils` - 错误类型、ID 和日志
//! - `api` - 公共 API 接口

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
pub mod core;
pub mod host;
pub mod router;
pub mod utils;

// 重导出常用类型，方便使用
pub use router::{
    hooks, listener_fn, priority, CallbackBundle, EventRegistry, Flow, HookRegistry,
    LifecycleStage, Listener, RenderedPage, RequestState, Route, RouteState, Router,
};

pub use host::{
    DirectoryTemplateLocator, HostResponse, HostRuntime, RewriteRule, RewriteTable,
    StaticTemplateLocator, TemplateLocator,
};

pub use utils::{error_code, status_code, ListenerId, Result, RouteError};
pub use utils::logger::{LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};

pub use core::config::{HostConfig, LogConfig, RouteDefinition, RouterSettings, RouterSettingsBuilder};
pub use api::sdk::{PlainRoutes, PlainRoutesStats};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
