//! 参考宿主运行时
//!
//! 驱动固定的请求生命周期：
//!
//! ```text
//! resolve(path) -> parse_request -> pre_get_posts -> wp_title -> wp -> template
//! ```
//!
//! 重写规则表和可识别查询参数在首次请求时通过过滤器收集并缓存。
//! 每个请求在注册表的独立副本上分发，请求期间接入的监听器随请求结束一起丢弃。
//! 任一阶段的监听器终止请求时，渲染好的页面直接成为响应体。

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn, Instrument};

use super::rewrite::{RewriteMatch, RewriteRule, RewriteTable};
use super::template::{DirectoryTemplateLocator, TemplateLocator};
use crate::core::config::HostConfig;
use crate::request_span;
use crate::router::event::{Emission, RenderedPage, RequestState};
use crate::router::registry::{EventRegistry, HookRegistry};
use crate::router::stage::{hooks, LifecycleStage};
use crate::utils::{status_code, Result, RouteError};

/// 标题分隔符
const TITLE_SEPARATOR: &str = "|";
/// 标题分隔符位置
const TITLE_SEPARATOR_LOCATION: &str = "right";

/// 一次请求的处理结果
#[derive(Debug, Clone, Serialize)]
pub struct HostResponse {
    /// 请求 ID
    pub request_id: String,
    /// 请求路径
    pub path: String,
    /// 状态码：有规则匹配为 200，否则 404
    pub status: u16,
    /// 匹配到的重写规则
    pub matched_rule: Option<String>,
    /// 过滤后的查询对象
    pub query: Value,
    /// 页面标题（在 wp_title 之前终止时为空）
    pub title: Option<String>,
    /// 最终模板名
    pub template: Option<String>,
    /// 响应体
    pub body: Option<String>,
    /// 终止请求的钩子
    pub halted_at: Option<String>,
    /// 本请求中接入回调的路由模式
    pub engaged_routes: Vec<String>,
    /// 处理耗时（微秒）
    pub elapsed_us: u64,
}

impl HostResponse {
    fn new(request: &RequestState, query: Value) -> Self {
        Self {
            request_id: request.request_id.clone(),
            path: request.path.clone(),
            status: if request.matched_rule.is_some() {
                status_code::OK
            } else {
                status_code::NOT_FOUND
            },
            matched_rule: request.matched_rule.clone(),
            query,
            title: None,
            template: None,
            body: None,
            halted_at: None,
            engaged_routes: Vec::new(),
            elapsed_us: 0,
        }
    }

    /// 是否被某个监听器终止
    pub fn is_halted(&self) -> bool {
        self.halted_at.is_some()
    }

    fn halt(&mut self, hook: &str, page: RenderedPage) {
        self.halted_at = Some(hook.to_string());
        self.template = Some(page.template);
        self.body = Some(page.body);
    }
}

/// 宿主运行时
pub struct HostRuntime {
    /// 全局钩子注册表
    registry: Arc<HookRegistry>,
    /// 宿主配置
    config: HostConfig,
    /// 宿主自身的模板定位器
    templates: Arc<dyn TemplateLocator>,
    /// 缓存的重写规则表
    table: RwLock<Option<Arc<RewriteTable>>>,
    /// 缓存的可识别查询参数
    query_vars: RwLock<Option<Arc<Vec<String>>>>,
}

impl HostRuntime {
    /// 创建宿主运行时
    ///
    /// 模板目录为空时在当前目录查找模板。
    pub fn new(registry: Arc<HookRegistry>, config: HostConfig) -> Self {
        let templates: Arc<dyn TemplateLocator> = if config.template_dirs.is_empty() {
            Arc::new(DirectoryTemplateLocator::new(["."]))
        } else {
            Arc::new(DirectoryTemplateLocator::new(config.template_dirs.clone()))
        };

        Self {
            registry,
            config,
            templates,
            table: RwLock::new(None),
            query_vars: RwLock::new(None),
        }
    }

    /// 替换宿主的模板定位器
    pub fn with_templates(mut self, templates: Arc<dyn TemplateLocator>) -> Self {
        self.templates = templates;
        self
    }

    /// 全局钩子注册表
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// 宿主配置
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// 宿主的模板定位器
    pub fn templates(&self) -> &Arc<dyn TemplateLocator> {
        &self.templates
    }

    /// 重新收集重写规则和查询参数
    ///
    /// 路由注册之后调用，下一次请求使用新的规则表。
    pub async fn flush_rewrite_rules(&self) -> Result<Arc<RewriteTable>> {
        let base = serde_json::to_value(&self.config.base_rules)?;
        let emission = self
            .registry
            .filter(None, hooks::REWRITE_RULES, base, vec![])
            .await?;
        let rules: Vec<RewriteRule> = decode(hooks::REWRITE_RULES, emission.value)?;
        let table = Arc::new(RewriteTable::compile(rules)?);

        let emission = self
            .registry
            .filter(
                None,
                hooks::QUERY_VARS,
                serde_json::to_value(&self.config.default_query_vars)?,
                vec![],
            )
            .await?;
        let mut vars: Vec<String> = decode(hooks::QUERY_VARS, emission.value)?;
        let mut seen = std::collections::HashSet::new();
        vars.retain(|var| seen.insert(var.clone()));
        let vars = Arc::new(vars);

        *self.table.write().await = Some(Arc::clone(&table));
        *self.query_vars.write().await = Some(Arc::clone(&vars));

        info!(rules = table.len(), query_vars = vars.len(), "重写规则已刷新");
        Ok(table)
    }

    /// 当前重写规则表（首次调用时刷新）
    pub async fn rewrite_table(&self) -> Result<Arc<RewriteTable>> {
        if let Some(table) = self.table.read().await.as_ref() {
            return Ok(Arc::clone(table));
        }
        self.flush_rewrite_rules().await
    }

    /// 宿主可识别的查询参数（首次调用时刷新）
    pub async fn query_vars(&self) -> Result<Arc<Vec<String>>> {
        if let Some(vars) = self.query_vars.read().await.as_ref() {
            return Ok(Arc::clone(vars));
        }
        self.flush_rewrite_rules().await?;
        self.query_vars
            .read()
            .await
            .clone()
            .ok_or_else(|| RouteError::InitFailed("查询参数未能收集".to_string()))
    }

    /// 丢弃缓存，下一次请求重新收集
    pub async fn invalidate(&self) {
        *self.table.write().await = None;
        *self.query_vars.write().await = None;
        debug!("重写规则缓存已失效");
    }

    /// 处理一个请求路径
    pub async fn handle(&self, path: &str) -> Result<HostResponse> {
        let table = self.rewrite_table().await?;
        let recognized = self.query_vars().await?;
        let resolved = table.resolve(path);

        let request = RequestState::new(path, resolved.as_ref().map(|m| m.matched_rule.clone()));
        let span = request_span!(request.request_id, request.path);

        self.run(request, resolved, &recognized).instrument(span).await
    }

    async fn run(
        &self,
        request: RequestState,
        resolved: Option<RewriteMatch>,
        recognized: &[String],
    ) -> Result<HostResponse> {
        let started = Instant::now();
        let scope = self.registry.fork(request.request_id.clone()).await;
        let req = Some(&request);

        let query: Map<String, Value> = resolved
            .iter()
            .flat_map(|m| m.query.iter())
            .filter(|(key, _)| recognized.contains(key))
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();

        debug!(
            matched_rule = ?request.matched_rule,
            target = ?resolved.as_ref().map(|m| m.target.as_str()),
            "路径已解析"
        );

        let mut response = HostResponse::new(&request, Value::Object(query.clone()));

        let parsed = json!({
            "path": request.path,
            "matched_rule": request.matched_rule,
            "query": query,
        });
        let emission = scope.emit(req, hooks::PARSE_REQUEST, vec![parsed]).await?;
        if self.advance(&mut response, hooks::PARSE_REQUEST, emission).is_none() {
            return self.finish(response, &request, started).await;
        }

        let stage = LifecycleStage::BeforeQuery.hook_name();
        let emission = scope
            .filter(req, stage, Value::Object(query), vec![])
            .await?;
        match self.advance(&mut response, stage, emission) {
            Some(value) => response.query = value,
            None => return self.finish(response, &request, started).await,
        }

        let stage = LifecycleStage::Title.hook_name();
        let emission = scope
            .filter(
                req,
                stage,
                Value::String(self.config.default_title.clone()),
                vec![json!(TITLE_SEPARATOR), json!(TITLE_SEPARATOR_LOCATION)],
            )
            .await?;
        match self.advance(&mut response, stage, emission) {
            Some(value) => response.title = Some(value_to_text(value)),
            None => return self.finish(response, &request, started).await,
        }

        let stage = LifecycleStage::Dispatch.hook_name();
        let emission = scope
            .emit(req, stage, vec![response.query.clone()])
            .await?;
        if self.advance(&mut response, stage, emission).is_none() {
            return self.finish(response, &request, started).await;
        }

        let stage = LifecycleStage::Template.hook_name();
        let emission = scope
            .filter(
                req,
                stage,
                Value::String(self.config.default_template.clone()),
                vec![],
            )
            .await?;
        let Some(template) = self.advance(&mut response, stage, emission) else {
            return self.finish(response, &request, started).await;
        };

        // 没有路由终止请求时，宿主自己渲染过滤后的模板
        let template = value_to_text(template);
        match self.templates.locate(&template).await {
            Ok(path) => response.body = Some(self.templates.include(&path).await?),
            Err(RouteError::TemplateNotFound(name)) => {
                warn!(template = %name, "宿主模板不存在，响应体为空");
            }
            Err(e) => return Err(e),
        }
        response.template = Some(template);

        self.finish(response, &request, started).await
    }

    /// 未被终止时返回分发后的值；被终止时记录页面并返回 `None`
    fn advance(&self, response: &mut HostResponse, hook: &str, emission: Emission) -> Option<Value> {
        match emission.halted {
            Some(page) => {
                response.halt(hook, page);
                None
            }
            None => Some(emission.value),
        }
    }

    async fn finish(
        &self,
        mut response: HostResponse,
        request: &RequestState,
        started: Instant,
    ) -> Result<HostResponse> {
        response.engaged_routes = request.engaged_patterns().await;
        response.elapsed_us = started.elapsed().as_micros() as u64;

        info!(
            status = response.status,
            halted_at = ?response.halted_at,
            template = ?response.template,
            engaged = response.engaged_routes.len(),
            elapsed_us = response.elapsed_us,
            "请求处理完成"
        );

        Ok(response)
    }
}

fn decode<T: serde::de::DeserializeOwned>(hook: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| RouteError::InvalidHookValue {
        hook: hook.to_string(),
        reason: e.to_string(),
    })
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
