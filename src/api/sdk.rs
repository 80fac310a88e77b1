//! PlainRoutes SDK
//!
//! 把钩子注册表、路由器和参考宿主组装在一起，对外提供统一入口：
//!
//! - 路由：添加路由、查看重写规则和查询参数
//! - 请求：按路径驱动一次完整的请求生命周期
//! - 统计：路由接入次数和钩子分发统计
//!
//! # 示例
//!
//! ```rust,no_run
//! use plain_routes::{CallbackBundle, PlainRoutes, RouterSettings};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = RouterSettings::builder()
//!         .template_dir("./templates")
//!         .build();
//!     let routes = PlainRoutes::new(settings).await?;
//!
//!     let bundle = CallbackBundle::builder()
//!         .rewrite("p=123")
//!         .on("wp_title", |_args| Ok(Value::from("Checkout")))
//!         .template("stripe.php")
//!         .build()?;
//!     routes.add_route("stripe(/)?", bundle, vec!["stripe".into()]).await?;
//!
//!     let response = routes.handle("/stripe/").await?;
//!     println!("{}", response.body.unwrap_or_default());
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::config::{RouteDefinition, RouterSettings};
use crate::host::rewrite::RewriteRule;
use crate::host::runtime::{HostResponse, HostRuntime};
use crate::host::template::{DirectoryTemplateLocator, TemplateLocator};
use crate::router::{
    CallbackBundle, HookRegistry, RegistryStats, Route, Router, RouterStatsSnapshot,
};
use crate::utils::Result;

/// 运行统计
#[derive(Debug, Clone, Serialize)]
pub struct PlainRoutesStats {
    /// 路由统计
    pub router: RouterStatsSnapshot,
    /// 全局注册表的分发统计
    pub registry: RegistryStats,
}

/// 路由适配器主结构体
///
/// # 组件
///
/// - `registry`: 全局钩子注册表，每个请求从它 fork 出独立作用域
/// - `router`: 持有全部路由
/// - `host`: 参考宿主，负责路径解析和生命周期分发
pub struct PlainRoutes {
    /// 配置
    settings: RouterSettings,

    /// 全局钩子注册表
    registry: Arc<HookRegistry>,

    /// 路由器
    router: Arc<Router>,

    /// 宿主运行时
    host: Arc<HostRuntime>,
}

impl PlainRoutes {
    /// 根据配置创建实例
    ///
    /// 配置先经过校验，其中的声明式路由随后全部注册。
    ///
    /// # Errors
    ///
    /// 配置无效或路由注册失败时返回错误
    pub async fn new(settings: RouterSettings) -> Result<Self> {
        info!("初始化 plain-routes v{}", crate::VERSION);
        settings.validate()?;

        let templates = template_locator(&settings);
        let registry = Arc::new(HookRegistry::new());

        let router = Arc::new(
            Router::new(registry.clone())
                .with_templates(Arc::clone(&templates))
                .with_rewrite_prefix(settings.host.rewrite_prefix.clone()),
        );
        let loaded = router.add_definitions(&settings.routes).await?;
        debug!(routes = loaded.len(), "路由器初始化完成");

        let host = Arc::new(
            HostRuntime::new(registry.clone(), settings.host.clone()).with_templates(templates),
        );
        debug!("宿主运行时初始化完成");

        if settings.dev_mode {
            info!("开发模式已启用");
        }

        Ok(Self {
            settings,
            registry,
            router,
            host,
        })
    }

    /// 从配置文件创建实例
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let settings = RouterSettings::from_file(path).await?;
        Self::new(settings).await
    }

    /// 添加路由
    ///
    /// 宿主的重写规则缓存随之失效，下一次请求会包含新规则。
    pub async fn add_route(
        &self,
        pattern: &str,
        bundle: CallbackBundle,
        query_vars: Vec<String>,
    ) -> Result<Arc<Route>> {
        let route = self.router.add_route(pattern, bundle, query_vars).await?;
        self.host.invalidate().await;
        Ok(route)
    }

    /// 添加声明式路由
    pub async fn add_definition(&self, definition: &RouteDefinition) -> Result<Arc<Route>> {
        self.add_route(
            &definition.pattern,
            CallbackBundle::from_definition(definition),
            definition.query_vars.clone(),
        )
        .await
    }

    /// 处理一个请求路径
    pub async fn handle(&self, path: &str) -> Result<HostResponse> {
        self.host.handle(path).await
    }

    /// 立即重新收集重写规则
    pub async fn flush_rewrite_rules(&self) -> Result<Vec<RewriteRule>> {
        let table = self.host.flush_rewrite_rules().await?;
        Ok(table.rules().cloned().collect())
    }

    /// 当前重写规则，按匹配顺序
    pub async fn rewrite_table(&self) -> Result<Vec<RewriteRule>> {
        let table = self.host.rewrite_table().await?;
        Ok(table.rules().cloned().collect())
    }

    /// 宿主可识别的查询参数
    pub async fn query_vars(&self) -> Result<Vec<String>> {
        Ok(self.host.query_vars().await?.to_vec())
    }

    /// 运行统计
    pub async fn stats(&self) -> PlainRoutesStats {
        PlainRoutesStats {
            router: self.router.stats().await,
            registry: self.registry.stats().await,
        }
    }

    /// 配置
    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// 全局钩子注册表
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// 路由器
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// 宿主运行时
    pub fn host(&self) -> &Arc<HostRuntime> {
        &self.host
    }
}

fn template_locator(settings: &RouterSettings) -> Arc<dyn TemplateLocator> {
    if settings.host.template_dirs.is_empty() {
        Arc::new(DirectoryTemplateLocator::new(["."]))
    } else {
        Arc::new(DirectoryTemplateLocator::new(
            settings.host.template_dirs.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::RouteError;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_new_registers_declarative_routes() {
        let settings = RouterSettings::builder()
            .base_rule("^$", "index.php?")
            .route(RouteDefinition::new("shop(/)?").with_rewrite("p=4").with_query_var("shop"))
            .build();
        let routes = PlainRoutes::new(settings).await.unwrap();

        let rules = routes.rewrite_table().await.unwrap();
        assert_eq!(rules[0], RewriteRule::new("shop(/)?", "index.php?p=4"));
        assert_eq!(rules[1].pattern, "^$");
        assert!(routes.query_vars().await.unwrap().contains(&"shop".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let settings = RouterSettings::builder()
            .route(RouteDefinition::new("shop(/?"))
            .build();
        assert!(matches!(
            PlainRoutes::new(settings).await,
            Err(RouteError::InvalidRewriteRule { .. })
        ));
    }

    #[tokio::test]
    async fn test_added_route_visible_to_next_request() {
        let routes = PlainRoutes::new(RouterSettings::default()).await.unwrap();
        assert!(routes.rewrite_table().await.unwrap().is_empty());

        let bundle = CallbackBundle::builder()
            .on("wp_title", |_| Ok(json!("Late")))
            .build()
            .unwrap();
        routes.add_route("late/?$", bundle, vec![]).await.unwrap();

        let response = routes.handle("/late").await.unwrap();
        assert_eq!(response.matched_rule.as_deref(), Some("late/?$"));
        assert_eq!(response.title.as_deref(), Some("Late"));

        let stats = routes.stats().await;
        assert_eq!(stats.router.total_engagements, 1);
    }

    #[tokio::test]
    async fn test_template_from_directory() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("stripe.php"), "<form/>").await.unwrap();

        let settings = RouterSettings::builder()
            .template_dir(dir.path())
            .route(RouteDefinition::new("stripe(/)?").with_template("stripe.php"))
            .build();
        let routes = PlainRoutes::new(settings).await.unwrap();

        let response = routes.handle("/stripe/").await.unwrap();
        assert_eq!(response.halted_at.as_deref(), Some("template"));
        assert_eq!(response.body.as_deref(), Some("<form/>"));

        let stats = routes.stats().await;
        assert_eq!(stats.registry.halts, 1);
        assert!(stats.registry.invocations > 0);
    }
}
