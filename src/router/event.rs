//! 钩子分发数据结构
//!
//! 定义监听器的输入输出、一次分发的结果以及请求级状态。

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

use super::registry::EventRegistry;
use crate::utils::generate_request_id;

/// 监听器参数
pub type HookArgs = Vec<Value>;

/// 模板渲染结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedPage {
    /// 回调包中的模板名
    pub template: String,

    /// 解析后的模板路径
    pub path: PathBuf,

    /// 模板内容（响应体）
    pub body: String,

    /// 渲染时间
    pub rendered_at: DateTime<Utc>,
}

impl RenderedPage {
    /// 创建渲染结果
    pub fn new(template: impl Into<String>, path: impl Into<PathBuf>, body: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            path: path.into(),
            body: body.into(),
            rendered_at: Utc::now(),
        }
    }
}

/// 监听器执行结果
#[derive(Debug, Clone)]
pub enum Flow {
    /// 继续执行后续监听器，携带返回值
    ///
    /// 在过滤器中 `Value::Null` 表示不修改当前值；动作忽略返回值。
    Continue(Value),

    /// 终止当前分发和整个请求周期，以渲染好的页面作为响应
    Halt(RenderedPage),
}

impl Flow {
    /// 不带返回值地继续
    pub fn proceed() -> Self {
        Flow::Continue(Value::Null)
    }
}

/// 一次分发的结果
#[derive(Debug, Clone)]
pub struct Emission {
    /// 过滤器的最终值；动作为第一个参数（没有参数时为 Null）
    pub value: Value,

    /// 实际调用的监听器数量
    pub invoked: usize,

    /// 若某个监听器终止了请求，这里是它渲染的页面
    pub halted: Option<RenderedPage>,
}

impl Emission {
    /// 没有任何监听器时的结果
    pub fn untouched(value: Value) -> Self {
        Self {
            value,
            invoked: 0,
            halted: None,
        }
    }

    /// 是否被终止
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }
}

/// 路由在一次请求中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteState {
    /// 初始状态，仍在监听
    Unmatched,
    /// 回调已接入（本请求内为终态）
    Engaged,
}

/// 请求级状态
///
/// 每个宿主请求创建一个，请求结束即丢弃，因此路由状态不会跨请求保留。
#[derive(Debug)]
pub struct RequestState {
    /// 请求 ID
    pub request_id: String,

    /// 请求路径
    pub path: String,

    /// 宿主匹配到的重写规则
    pub matched_rule: Option<String>,

    /// 接收时间
    pub received_at: DateTime<Utc>,

    /// 已接入回调的路由：路由 ID -> 路由模式
    engaged: Mutex<HashMap<u64, String>>,
}

impl RequestState {
    /// 创建请求状态
    pub fn new(path: impl Into<String>, matched_rule: Option<String>) -> Self {
        Self {
            request_id: generate_request_id(),
            path: path.into(),
            matched_rule,
            received_at: Utc::now(),
            engaged: Mutex::new(HashMap::new()),
        }
    }

    /// 记录某个路由进入 Engaged 状态
    ///
    /// 以路由 ID 区分，同一模式的不同路由各自接入。
    /// 返回 `false` 表示该路由在本请求中已经接入过。
    pub async fn mark_engaged(&self, route_id: u64, pattern: &str) -> bool {
        let mut engaged = self.engaged.lock().await;
        if engaged.contains_key(&route_id) {
            return false;
        }
        engaged.insert(route_id, pattern.to_string());
        true
    }

    /// 查询指定路由在本请求中的状态
    pub async fn state_of(&self, route_id: u64) -> RouteState {
        if self.engaged.lock().await.contains_key(&route_id) {
            RouteState::Engaged
        } else {
            RouteState::Unmatched
        }
    }

    /// 查询模式在本请求中的状态，任一同模式路由接入即为 `Engaged`
    pub async fn route_state(&self, pattern: &str) -> RouteState {
        if self.engaged.lock().await.values().any(|p| p == pattern) {
            RouteState::Engaged
        } else {
            RouteState::Unmatched
        }
    }

    /// 本请求中已接入的路由模式（排序后）
    pub async fn engaged_patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self.engaged.lock().await.values().cloned().collect();
        patterns.sort();
        patterns.dedup();
        patterns
    }
}

/// 监听器调用上下文
#[derive(Clone, Copy)]
pub struct HookContext<'a> {
    /// 正在分发的注册表（请求期间为请求作用域）
    pub registry: &'a dyn EventRegistry,

    /// 当前请求；启动阶段的分发（如刷新重写规则）没有请求
    pub request: Option<&'a RequestState>,

    /// 当前钩子名
    pub hook: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_route_state_transitions_once() {
        let request = RequestState::new("/shop", Some("shop(/)?".to_string()));
        assert_eq!(request.route_state("shop(/)?").await, RouteState::Unmatched);

        assert!(request.mark_engaged(1, "shop(/)?").await);
        assert!(!request.mark_engaged(1, "shop(/)?").await);
        assert_eq!(request.route_state("shop(/)?").await, RouteState::Engaged);
        assert_eq!(request.state_of(1).await, RouteState::Engaged);
        assert_eq!(request.state_of(2).await, RouteState::Unmatched);

        assert!(request.mark_engaged(2, "shop(/)?").await);
        assert_eq!(request.engaged_patterns().await, vec!["shop(/)?".to_string()]);
    }

    #[test]
    fn test_requests_get_distinct_ids() {
        let a = RequestState::new("/", None);
        let b = RequestState::new("/", None);
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_emission_untouched() {
        let emission = Emission::untouched(Value::from("title"));
        assert_eq!(emission.invoked, 0);
        assert!(!emission.is_halted());
    }
}
