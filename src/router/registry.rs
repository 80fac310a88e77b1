//! 钩子注册表
//!
//! 路由适配器只依赖 [`EventRegistry`] 这一能力：按名字注册带优先级和参数个数声明的监听器，
//! 以及按名字触发动作或过滤器。[`HookRegistry`] 是其进程内实现。
//!
//! # 分发规则
//!
//! - 监听器按优先级升序执行，同优先级按注册顺序执行
//! - 每个监听器最多收到 `arity` 个前导参数
//! - 分发前对监听器列表做快照，监听器在分发过程中注册的新监听器从下一次分发开始生效
//! - 第一个返回 [`Flow::Halt`] 的监听器终止本次分发
//! - 监听器返回的错误立即向上传播，不做重试
//!
//! # 使用示例
//!
//! ```ignore
//! use plain_routes::router::{listener_fn, EventRegistry, HookRegistry, priority};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let registry = HookRegistry::new();
//! registry
//!     .on("wp_title", listener_fn("suffix", |args| {
//!         Ok(json!(format!("{} | Shop", args[0].as_str().unwrap_or(""))))
//!     }), priority::DEFAULT, 1)
//!     .await?;
//!
//! let emission = registry.filter(None, "wp_title", json!("Home"), vec![]).await?;
//! assert_eq!(emission.value, json!("Home | Shop"));
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};

use super::event::{Emission, Flow, HookArgs, HookContext, RequestState};
use crate::utils::{ListenerId, Result, RouteError};

/// 全局注册表的作用域名
const GLOBAL_SCOPE: &str = "global";

/// 监听器
#[async_trait]
pub trait Listener: Send + Sync {
    /// 处理一次钩子调用
    async fn call(&self, ctx: HookContext<'_>, args: HookArgs) -> Result<Flow>;

    /// 监听器名称（用于日志和诊断）
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// 同步闭包监听器的函数类型
pub type ListenerFn = Arc<dyn Fn(HookArgs) -> Result<Value> + Send + Sync>;

/// 把同步闭包包装成监听器
pub struct FnListener {
    name: String,
    f: ListenerFn,
}

#[async_trait]
impl Listener for FnListener {
    async fn call(&self, _ctx: HookContext<'_>, args: HookArgs) -> Result<Flow> {
        (self.f)(args).map(Flow::Continue)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 从闭包创建监听器
pub fn listener_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Listener>
where
    F: Fn(HookArgs) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(FnListener {
        name: name.into(),
        f: Arc::new(f),
    })
}

/// 钩子注册能力
///
/// 路由适配器通过该 trait 与宿主交互，不依赖任何全局状态。
#[async_trait]
pub trait EventRegistry: Send + Sync {
    /// 注册监听器
    ///
    /// # 参数
    ///
    /// * `hook` - 钩子名
    /// * `listener` - 监听器
    /// * `priority` - 优先级，数值越小越先执行
    /// * `arity` - 监听器接收的前导参数个数
    async fn on(
        &self,
        hook: &str,
        listener: Arc<dyn Listener>,
        priority: i32,
        arity: usize,
    ) -> Result<ListenerId>;

    /// 触发动作，监听器的返回值被忽略
    async fn emit(
        &self,
        request: Option<&RequestState>,
        hook: &str,
        args: HookArgs,
    ) -> Result<Emission>;

    /// 触发过滤器，`value` 依次经过每个监听器
    async fn filter(
        &self,
        request: Option<&RequestState>,
        hook: &str,
        value: Value,
        extra: HookArgs,
    ) -> Result<Emission>;

    /// 指定钩子上的监听器数量
    async fn listener_count(&self, hook: &str) -> usize;
}

/// 内部监听器条目
#[derive(Clone)]
struct ListenerEntry {
    id: ListenerId,
    /// 全局递增的注册序号，同优先级按它排序
    seq: u64,
    priority: i32,
    arity: usize,
    listener: Arc<dyn Listener>,
    registered_at: DateTime<Utc>,
}

/// 监听器描述（对外展示用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerInfo {
    /// 监听器 ID
    pub id: ListenerId,
    /// 监听器名称
    pub name: String,
    /// 优先级
    pub priority: i32,
    /// 参数个数声明
    pub arity: usize,
    /// 注册时间
    pub registered_at: DateTime<Utc>,
}

/// 分发统计信息
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    /// 注册的监听器总数
    pub registered: u64,
    /// 分发次数
    pub emissions: u64,
    /// 监听器调用次数
    pub invocations: u64,
    /// 被终止的分发次数
    pub halts: u64,
    /// 因监听器出错而中断的分发次数
    pub failures: u64,
    /// 最后分发时间
    pub last_emit_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchMode {
    Action,
    Filter,
}

/// 进程内钩子注册表
///
/// `Clone` 得到的是共享同一份监听器表的句柄；需要独立副本时使用 [`HookRegistry::fork`]。
#[derive(Clone)]
pub struct HookRegistry {
    /// 钩子名 -> 已排序的监听器列表
    listeners: Arc<RwLock<HashMap<String, Vec<ListenerEntry>>>>,

    /// 注册序号，与 fork 出来的副本共享
    sequence: Arc<AtomicU64>,

    /// 分发统计，与 fork 出来的副本共享
    stats: Arc<RwLock<RegistryStats>>,

    /// 作用域名（global 或请求 ID）
    scope: String,
}

impl HookRegistry {
    /// 创建空的全局注册表
    pub fn new() -> Self {
        debug!("创建钩子注册表");
        Self {
            listeners: Arc::new(RwLock::new(HashMap::new())),
            sequence: Arc::new(AtomicU64::new(0)),
            stats: Arc::new(RwLock::new(RegistryStats::default())),
            scope: GLOBAL_SCOPE.to_string(),
        }
    }

    /// 复制出一个独立的作用域
    ///
    /// 副本包含当前所有监听器；之后在副本上注册的监听器不会影响原注册表。
    /// 分发统计与原注册表共享，请求作用域内的分发也计入全局统计。
    /// 宿主为每个请求 fork 一次，请求结束即丢弃。
    pub async fn fork(&self, scope: impl Into<String>) -> HookRegistry {
        let listeners = self.listeners.read().await.clone();
        let scope = scope.into();
        trace!(from = %self.scope, to = %scope, "fork 钩子注册表");

        HookRegistry {
            listeners: Arc::new(RwLock::new(listeners)),
            sequence: Arc::clone(&self.sequence),
            stats: Arc::clone(&self.stats),
            scope,
        }
    }

    /// 作用域名
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// 所有有监听器的钩子名（排序后）
    pub async fn hooks(&self) -> Vec<String> {
        let mut hooks: Vec<String> = self.listeners.read().await.keys().cloned().collect();
        hooks.sort();
        hooks
    }

    /// 按执行顺序描述指定钩子上的监听器
    pub async fn describe(&self, hook: &str) -> Vec<ListenerInfo> {
        self.listeners
            .read()
            .await
            .get(hook)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| ListenerInfo {
                        id: entry.id.clone(),
                        name: entry.listener.name().to_string(),
                        priority: entry.priority,
                        arity: entry.arity,
                        registered_at: entry.registered_at,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 获取分发统计
    pub async fn stats(&self) -> RegistryStats {
        self.stats.read().await.clone()
    }

    async fn snapshot(&self, hook: &str) -> Vec<ListenerEntry> {
        self.listeners
            .read()
            .await
            .get(hook)
            .cloned()
            .unwrap_or_default()
    }

    async fn record(&self, invoked: usize, halted: bool, failed: bool) {
        let mut stats = self.stats.write().await;
        stats.emissions += 1;
        stats.invocations += invoked as u64;
        if halted {
            stats.halts += 1;
        }
        if failed {
            stats.failures += 1;
        }
        stats.last_emit_at = Some(Utc::now());
    }

    async fn dispatch(
        &self,
        request: Option<&RequestState>,
        hook: &str,
        mut args: HookArgs,
        mode: DispatchMode,
    ) -> Result<Emission> {
        let entries = self.snapshot(hook).await;

        if entries.is_empty() {
            trace!(scope = %self.scope, hook = %hook, "没有监听器");
            self.record(0, false, false).await;
            return Ok(Emission::untouched(args.into_iter().next().unwrap_or(Value::Null)));
        }

        let mut invoked = 0;
        for entry in entries {
            let call_args: HookArgs = args.iter().take(entry.arity).cloned().collect();
            let ctx = HookContext {
                registry: self,
                request,
                hook,
            };

            let flow = match entry.listener.call(ctx, call_args).await {
                Ok(flow) => flow,
                Err(e) => {
                    self.record(invoked + 1, false, true).await;
                    warn!(
                        scope = %self.scope,
                        hook = %hook,
                        listener_id = %entry.id,
                        listener = %entry.listener.name(),
                        error = %e,
                        "监听器执行失败"
                    );
                    return Err(e);
                }
            };
            invoked += 1;

            match flow {
                Flow::Continue(value) => {
                    if mode == DispatchMode::Filter && !value.is_null() {
                        match args.first_mut() {
                            Some(slot) => *slot = value,
                            None => args.push(value),
                        }
                    }
                }
                Flow::Halt(page) => {
                    self.record(invoked, true, false).await;
                    info!(
                        scope = %self.scope,
                        hook = %hook,
                        listener = %entry.listener.name(),
                        template = %page.template,
                        "请求被监听器终止"
                    );
                    return Ok(Emission {
                        value: args.into_iter().next().unwrap_or(Value::Null),
                        invoked,
                        halted: Some(page),
                    });
                }
            }
        }

        self.record(invoked, false, false).await;
        trace!(scope = %self.scope, hook = %hook, invoked, "钩子分发完成");

        Ok(Emission {
            value: args.into_iter().next().unwrap_or(Value::Null),
            invoked,
            halted: None,
        })
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventRegistry for HookRegistry {
    async fn on(
        &self,
        hook: &str,
        listener: Arc<dyn Listener>,
        priority: i32,
        arity: usize,
    ) -> Result<ListenerId> {
        if hook.trim().is_empty() {
            return Err(RouteError::RegistrationFailed {
                hook: hook.to_string(),
                reason: "钩子名不能为空".to_string(),
            });
        }

        let entry = ListenerEntry {
            id: ListenerId::generate(),
            seq: self.sequence.fetch_add(1, Ordering::Relaxed),
            priority,
            arity,
            listener,
            registered_at: Utc::now(),
        };
        let id = entry.id.clone();

        {
            let mut listeners = self.listeners.write().await;
            let list = listeners.entry(hook.to_string()).or_default();
            let position =
                list.partition_point(|e| (e.priority, e.seq) <= (entry.priority, entry.seq));
            debug!(
                scope = %self.scope,
                hook = %hook,
                listener_id = %id,
                listener = %entry.listener.name(),
                priority,
                position,
                "注册监听器"
            );
            list.insert(position, entry);
        }

        self.stats.write().await.registered += 1;
        Ok(id)
    }

    async fn emit(
        &self,
        request: Option<&RequestState>,
        hook: &str,
        args: HookArgs,
    ) -> Result<Emission> {
        self.dispatch(request, hook, args, DispatchMode::Action).await
    }

    async fn filter(
        &self,
        request: Option<&RequestState>,
        hook: &str,
        value: Value,
        extra: HookArgs,
    ) -> Result<Emission> {
        let mut args = Vec::with_capacity(extra.len() + 1);
        args.push(value);
        args.extend(extra);
        self.dispatch(request, hook, args, DispatchMode::Filter).await
    }

    async fn listener_count(&self, hook: &str) -> usize {
        self.listeners
            .read()
            .await
            .get(hook)
            .map(Vec::len)
            .unwrap_or(0)
    }
}
