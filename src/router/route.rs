//! 路由注册与分发适配器
//!
//! 一个 [`Route`] 把一条重写模式和一个回调包绑定在一起。注册时向注册表挂上三个监听器：
//!
//! 1. `rewrite_rules_array` 过滤器：把 `模式 -> 前缀 + rewrite` 放到规则表头
//! 2. `query_vars` 过滤器：追加声明的查询参数
//! 3. `parse_request` 动作：比较宿主匹配到的规则，相等时接入回调
//!
//! 匹配只做字符串相等比较，正则由宿主执行。
//!
//! # 使用示例
//!
//! ```ignore
//! use plain_routes::router::{CallbackBundle, HookRegistry, Route};
//! use serde_json::Value;
//!
//! let registry = HookRegistry::new();
//! let bundle = CallbackBundle::builder()
//!     .rewrite("p=123")
//!     .on("pre_get_posts", |args| {
//!         let mut query = args.into_iter().next().unwrap_or(Value::Null);
//!         query["stripe"] = Value::Bool(true);
//!         Ok(query)
//!     })
//!     .build()?;
//!
//! let route = Route::create(&registry, "stripe(/)?", bundle, vec!["stripe".into()]).await?;
//! assert_eq!(route.pattern(), "stripe(/)?");
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

use super::bundle::CallbackBundle;
use super::event::{Flow, HookArgs, HookContext, RenderedPage, RequestState, RouteState};
use super::registry::{EventRegistry, Listener};
use super::stage::{hooks, priority, LifecycleStage, ARITY_ALL};
use crate::core::config::DEFAULT_REWRITE_PREFIX;
use crate::host::rewrite::{prepend_rule, RewriteRule};
use crate::host::template::{DirectoryTemplateLocator, TemplateLocator};
use crate::utils::{Result, RouteError};

/// 进程内路由 ID 计数器
static NEXT_ROUTE_ID: AtomicU64 = AtomicU64::new(1);

/// 路由
pub struct Route {
    /// 进程内唯一的路由 ID
    id: u64,
    /// 路由模式，创建后不可变
    pattern: String,
    /// 回调包
    bundle: CallbackBundle,
    /// 声明的查询参数
    query_vars: Vec<String>,
    /// 重写目标前缀
    rewrite_prefix: String,
    /// 模板定位器
    templates: Arc<dyn TemplateLocator>,
    /// 接入次数（跨请求累计）
    engagements: AtomicU64,
}

impl Route {
    /// 创建未注册的路由
    ///
    /// 默认使用 `index.php?` 前缀，并在当前目录查找模板。
    pub fn new(pattern: impl Into<String>, bundle: CallbackBundle, query_vars: Vec<String>) -> Self {
        Self {
            id: NEXT_ROUTE_ID.fetch_add(1, Ordering::Relaxed),
            pattern: pattern.into(),
            bundle,
            query_vars,
            rewrite_prefix: DEFAULT_REWRITE_PREFIX.to_string(),
            templates: Arc::new(DirectoryTemplateLocator::new(["."])),
            engagements: AtomicU64::new(0),
        }
    }

    /// 设置重写目标前缀
    pub fn with_rewrite_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.rewrite_prefix = prefix.into();
        self
    }

    /// 设置模板定位器
    pub fn with_templates(mut self, templates: Arc<dyn TemplateLocator>) -> Self {
        self.templates = templates;
        self
    }

    /// 创建并注册路由
    pub async fn create(
        registry: &dyn EventRegistry,
        pattern: impl Into<String>,
        bundle: CallbackBundle,
        query_vars: Vec<String>,
    ) -> Result<Arc<Route>> {
        Self::new(pattern, bundle, query_vars).register(registry).await
    }

    /// 向注册表挂上重写规则、查询参数和匹配监听器
    ///
    /// 注册表返回的错误原样传播。
    pub async fn register(self, registry: &dyn EventRegistry) -> Result<Arc<Route>> {
        let route = Arc::new(self);

        registry
            .on(
                hooks::REWRITE_RULES,
                Arc::new(RewriteContributor {
                    name: format!("rewrite:{}", route.pattern),
                    rule: RewriteRule::new(route.pattern.clone(), route.rewrite_target()),
                }),
                priority::DEFAULT,
                1,
            )
            .await?;

        registry
            .on(
                hooks::QUERY_VARS,
                Arc::new(QueryVarContributor {
                    name: format!("query_vars:{}", route.pattern),
                    names: route.query_vars.clone(),
                }),
                priority::DEFAULT,
                1,
            )
            .await?;

        registry
            .on(
                hooks::PARSE_REQUEST,
                Arc::new(MatchListener {
                    name: format!("match:{}", route.pattern),
                    route: Arc::clone(&route),
                }),
                priority::DEFAULT,
                1,
            )
            .await?;

        info!(
            pattern = %route.pattern,
            target = %route.rewrite_target(),
            query_vars = ?route.query_vars,
            "路由已注册"
        );

        Ok(route)
    }

    /// 路由 ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 路由模式
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 回调包
    pub fn bundle(&self) -> &CallbackBundle {
        &self.bundle
    }

    /// 声明的查询参数
    pub fn query_vars(&self) -> &[String] {
        &self.query_vars
    }

    /// 贡献给宿主的重写目标
    pub fn rewrite_target(&self) -> String {
        format!("{}{}", self.rewrite_prefix, self.bundle.rewrite().unwrap_or(""))
    }

    /// 宿主匹配到的规则是否就是本路由
    pub fn matches(&self, matched_rule: &str) -> bool {
        self.pattern == matched_rule
    }

    /// 累计接入次数
    pub fn engagements(&self) -> u64 {
        self.engagements.load(Ordering::Relaxed)
    }

    /// 处理宿主的匹配结果
    ///
    /// 匹配时接入回调。同一请求内只接入一次，重复的匹配通知直接返回 `Engaged`。
    pub async fn on_request_matched(
        self: &Arc<Self>,
        ctx: HookContext<'_>,
        matched_rule: Option<&str>,
    ) -> Result<RouteState> {
        if !matched_rule.map(|rule| self.matches(rule)).unwrap_or(false) {
            trace!(pattern = %self.pattern, matched_rule = ?matched_rule, "路由未匹配");
            return Ok(match ctx.request {
                Some(request) => request.state_of(self.id).await,
                None => RouteState::Unmatched,
            });
        }

        if let Some(request) = ctx.request {
            if !request.mark_engaged(self.id, &self.pattern).await {
                debug!(
                    pattern = %self.pattern,
                    request_id = %request.request_id,
                    "路由在本请求中已接入"
                );
                return Ok(RouteState::Engaged);
            }
        }

        self.engage_callbacks(ctx.registry, ctx.request).await?;
        Ok(RouteState::Engaged)
    }

    /// 把回调包中存在的阶段接入注册表
    ///
    /// 普通阶段以默认优先级注册并接收宿主提供的全部参数；模板阶段以最高优先级注册且不接收参数。
    /// 完成后发出 `plain_routes` 通知，载荷为回调包摘要和路由模式。
    pub async fn engage_callbacks(
        self: &Arc<Self>,
        registry: &dyn EventRegistry,
        request: Option<&RequestState>,
    ) -> Result<Vec<LifecycleStage>> {
        let mut engaged = Vec::new();

        for stage in LifecycleStage::ALL {
            if !self.bundle.has_stage(stage) {
                continue;
            }

            let (listener, order, arity): (Arc<dyn Listener>, i32, usize) = match stage {
                LifecycleStage::Template => (
                    Arc::new(TemplateListener {
                        name: format!("template:{}", self.pattern),
                        route: Arc::clone(self),
                    }) as Arc<dyn Listener>,
                    priority::HIGHEST,
                    0,
                ),
                _ => (
                    Arc::new(StageForwarder {
                        name: format!("{}:{}", stage, self.pattern),
                        route: Arc::clone(self),
                        stage,
                    }) as Arc<dyn Listener>,
                    priority::DEFAULT,
                    ARITY_ALL,
                ),
            };

            registry.on(stage.hook_name(), listener, order, arity).await?;
            engaged.push(stage);
        }

        let payload = serde_json::to_value(self.bundle.summary())?;
        registry
            .emit(
                request,
                hooks::ROUTE_ENGAGED,
                vec![payload, Value::String(self.pattern.clone())],
            )
            .await?;

        self.engagements.fetch_add(1, Ordering::Relaxed);
        info!(pattern = %self.pattern, stages = ?engaged, "路由已接入回调");

        Ok(engaged)
    }

    /// 解析并读取模板，作为响应体
    ///
    /// 定位失败时返回 `TemplateNotFound`，调用方不会收到终止信号。
    pub async fn render_template(&self) -> Result<RenderedPage> {
        let template = self
            .bundle
            .template()
            .ok_or_else(|| RouteError::CallbackNotFound {
                pattern: self.pattern.clone(),
                stage: LifecycleStage::Template.to_string(),
            })?;

        let path = self.templates.locate(template).await?;
        let body = self.templates.include(&path).await?;

        info!(
            pattern = %self.pattern,
            template = %template,
            path = %path.display(),
            "模板已渲染，终止请求"
        );

        Ok(RenderedPage::new(template, path, body))
    }

    /// 把阶段调用转发给回调包中的回调
    ///
    /// # 错误
    ///
    /// - 阶段名未知：`RouteError::UnknownStage`
    /// - 回调包中没有该阶段的回调：`RouteError::CallbackNotFound`
    pub fn forward(&self, stage_name: &str, args: HookArgs) -> Result<Value> {
        let stage: LifecycleStage = stage_name.parse()?;
        let callback = self
            .bundle
            .callback(stage)
            .ok_or_else(|| RouteError::CallbackNotFound {
                pattern: self.pattern.clone(),
                stage: stage_name.to_string(),
            })?;

        trace!(pattern = %self.pattern, stage = %stage, args = args.len(), "转发阶段调用");
        callback(args)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("bundle", &self.bundle)
            .field("query_vars", &self.query_vars)
            .field("rewrite_prefix", &self.rewrite_prefix)
            .field("engagements", &self.engagements())
            .finish()
    }
}

/// 解析钩子传入的值，缺省或 Null 时取默认值
fn decode_value<T: DeserializeOwned + Default>(hook: &str, value: Option<Value>) -> Result<T> {
    match value {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| RouteError::InvalidHookValue {
            hook: hook.to_string(),
            reason: e.to_string(),
        }),
    }
}

struct RewriteContributor {
    name: String,
    rule: RewriteRule,
}

#[async_trait]
impl Listener for RewriteContributor {
    async fn call(&self, ctx: HookContext<'_>, args: HookArgs) -> Result<Flow> {
        let rules: Vec<RewriteRule> = decode_value(ctx.hook, args.into_iter().next())?;
        let merged = prepend_rule(rules, self.rule.clone());
        Ok(Flow::Continue(serde_json::to_value(merged)?))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct QueryVarContributor {
    name: String,
    names: Vec<String>,
}

#[async_trait]
impl Listener for QueryVarContributor {
    async fn call(&self, ctx: HookContext<'_>, args: HookArgs) -> Result<Flow> {
        let mut vars: Vec<String> = decode_value(ctx.hook, args.into_iter().next())?;
        vars.extend(self.names.iter().cloned());
        Ok(Flow::Continue(serde_json::to_value(vars)?))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct MatchListener {
    name: String,
    route: Arc<Route>,
}

#[async_trait]
impl Listener for MatchListener {
    async fn call(&self, ctx: HookContext<'_>, args: HookArgs) -> Result<Flow> {
        // 宿主可以直接传规则字符串，也可以传带 matched_rule 字段的请求对象
        let matched_rule = match args.first() {
            Some(Value::String(rule)) => Some(rule.as_str()),
            Some(request) => request.get("matched_rule").and_then(Value::as_str),
            None => None,
        };

        self.route.on_request_matched(ctx, matched_rule).await?;
        Ok(Flow::proceed())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct StageForwarder {
    name: String,
    route: Arc<Route>,
    stage: LifecycleStage,
}

#[async_trait]
impl Listener for StageForwarder {
    async fn call(&self, _ctx: HookContext<'_>, args: HookArgs) -> Result<Flow> {
        self.route
            .forward(self.stage.hook_name(), args)
            .map(Flow::Continue)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct TemplateListener {
    name: String,
    route: Arc<Route>,
}

#[async_trait]
impl Listener for TemplateListener {
    async fn call(&self, _ctx: HookContext<'_>, _args: HookArgs) -> Result<Flow> {
        self.route.render_template().await.map(Flow::Halt)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
