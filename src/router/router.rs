//! 路由器主结构体
//!
//! 持有注册表句柄和全部已注册路由，负责拒绝重复模式并汇总接入统计。

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::bundle::CallbackBundle;
use super::registry::EventRegistry;
use super::route::Route;
use crate::core::config::{RouteDefinition, DEFAULT_REWRITE_PREFIX};
use crate::host::template::{DirectoryTemplateLocator, TemplateLocator};
use crate::utils::{Result, RouteError};

/// 单个路由的统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteStats {
    /// 路由模式
    pub pattern: String,
    /// 重写目标
    pub target: String,
    /// 累计接入次数
    pub engagements: u64,
}

/// 路由器统计快照
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterStatsSnapshot {
    /// 路由数量
    pub route_count: usize,
    /// 全部路由的接入次数之和
    pub total_engagements: u64,
    /// 按注册顺序的路由统计
    pub routes: Vec<RouteStats>,
}

/// 路由器
pub struct Router {
    /// 钩子注册表
    registry: Arc<dyn EventRegistry>,
    /// 新路由使用的模板定位器
    templates: Arc<dyn TemplateLocator>,
    /// 新路由使用的重写前缀
    rewrite_prefix: String,
    /// 已注册路由，按注册顺序
    routes: RwLock<Vec<Arc<Route>>>,
}

impl Router {
    /// 创建路由器
    pub fn new(registry: Arc<dyn EventRegistry>) -> Self {
        Self {
            registry,
            templates: Arc::new(DirectoryTemplateLocator::new(["."])),
            rewrite_prefix: DEFAULT_REWRITE_PREFIX.to_string(),
            routes: RwLock::new(Vec::new()),
        }
    }

    /// 设置模板定位器
    pub fn with_templates(mut self, templates: Arc<dyn TemplateLocator>) -> Self {
        self.templates = templates;
        self
    }

    /// 设置重写前缀
    pub fn with_rewrite_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.rewrite_prefix = prefix.into();
        self
    }

    /// 注册表句柄
    pub fn registry(&self) -> &Arc<dyn EventRegistry> {
        &self.registry
    }

    /// 添加路由
    ///
    /// 同一模式只能注册一次，重复时返回 `RouteError::RouteAlreadyExists`。
    #[instrument(skip_all, fields(pattern = %pattern))]
    pub async fn add_route(
        &self,
        pattern: &str,
        bundle: CallbackBundle,
        query_vars: Vec<String>,
    ) -> Result<Arc<Route>> {
        let mut routes = self.routes.write().await;

        if routes.iter().any(|route| route.pattern() == pattern) {
            return Err(RouteError::RouteAlreadyExists(pattern.to_string()));
        }

        let route = Route::new(pattern, bundle, query_vars)
            .with_rewrite_prefix(self.rewrite_prefix.clone())
            .with_templates(Arc::clone(&self.templates))
            .register(self.registry.as_ref())
            .await?;

        routes.push(Arc::clone(&route));
        debug!(route_count = routes.len(), "路由已加入路由器");

        Ok(route)
    }

    /// 从声明式定义批量添加路由
    pub async fn add_definitions(&self, definitions: &[RouteDefinition]) -> Result<Vec<Arc<Route>>> {
        let mut added = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let route = self
                .add_route(
                    &definition.pattern,
                    CallbackBundle::from_definition(definition),
                    definition.query_vars.clone(),
                )
                .await?;
            added.push(route);
        }

        if !added.is_empty() {
            info!(count = added.len(), "已从配置加载路由");
        }
        Ok(added)
    }

    /// 查找路由
    pub async fn get(&self, pattern: &str) -> Option<Arc<Route>> {
        self.routes
            .read()
            .await
            .iter()
            .find(|route| route.pattern() == pattern)
            .cloned()
    }

    /// 查找路由，不存在时返回 `RouteError::RouteNotFound`
    pub async fn route(&self, pattern: &str) -> Result<Arc<Route>> {
        self.get(pattern)
            .await
            .ok_or_else(|| RouteError::RouteNotFound(pattern.to_string()))
    }

    /// 全部路由模式，按注册顺序
    pub async fn patterns(&self) -> Vec<String> {
        self.routes
            .read()
            .await
            .iter()
            .map(|route| route.pattern().to_string())
            .collect()
    }

    /// 路由数量
    pub async fn len(&self) -> usize {
        self.routes.read().await.len()
    }

    /// 是否没有路由
    pub async fn is_empty(&self) -> bool {
        self.routes.read().await.is_empty()
    }

    /// 获取统计快照
    pub async fn stats(&self) -> RouterStatsSnapshot {
        let routes: Vec<RouteStats> = self
            .routes
            .read()
            .await
            .iter()
            .map(|route| RouteStats {
                pattern: route.pattern().to_string(),
                target: route.rewrite_target(),
                engagements: route.engagements(),
            })
            .collect();

        RouterStatsSnapshot {
            route_count: routes.len(),
            total_engagements: routes.iter().map(|r| r.engagements).sum(),
            routes,
        }
    }
}
