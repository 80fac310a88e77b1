//! 路由模块
//!
//! 包含路由适配器的核心组件：
//! - 生命周期阶段与钩子名
//! - 钩子注册表与分发数据结构
//! - 回调包
//! - 路由与路由器

pub mod bundle;
pub mod event;
pub mod registry;
pub mod route;
pub mod router;
pub mod stage;

// 重导出常用类型
pub use bundle::{BundleBuilder, BundleSummary, Callback, CallbackBundle};
pub use event::{Emission, Flow, HookArgs, HookContext, RenderedPage, RequestState, RouteState};
pub use registry::{
    listener_fn, EventRegistry, FnListener, HookRegistry, Listener, ListenerFn, ListenerInfo,
    RegistryStats,
};
pub use route::Route;
pub use router::{RouteStats, Router, RouterStatsSnapshot};
pub use stage::{hooks, priority, LifecycleStage, ARITY_ALL, REWRITE_KEY};
