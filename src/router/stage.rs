//! 生命周期阶段与钩子名称
//!
//! 路由命中后只会接入固定的四个阶段，阶段以外的名字在构造回调包时即被拒绝。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::RouteError;

/// 宿主钩子名称
pub mod hooks {
    /// 重写规则表过滤器，值为 `[{pattern, target}]`
    pub const REWRITE_RULES: &str = "rewrite_rules_array";
    /// 查询参数过滤器，值为参数名数组
    pub const QUERY_VARS: &str = "query_vars";
    /// 每个请求一次，参数为 `{path, matched_rule, query}`
    pub const PARSE_REQUEST: &str = "parse_request";
    /// 路由接入回调后发出的通知，参数为回调包摘要
    pub const ROUTE_ENGAGED: &str = "plain_routes";
}

/// 监听器优先级（数值越小越先执行）
pub mod priority {
    /// 默认优先级
    pub const DEFAULT: i32 = 10;
    /// 最高优先级
    pub const HIGHEST: i32 = i32::MIN;
}

/// 接收宿主提供的全部参数
pub const ARITY_ALL: usize = usize::MAX;

/// 回调包中的重写片段键
pub const REWRITE_KEY: &str = "rewrite";

/// 生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LifecycleStage {
    /// 查询执行前
    #[serde(rename = "pre_get_posts", alias = "before-query")]
    BeforeQuery,
    /// 标题计算
    #[serde(rename = "wp_title", alias = "title")]
    Title,
    /// 最终分发
    #[serde(rename = "wp", alias = "dispatch")]
    Dispatch,
    /// 模板选择
    #[serde(rename = "template")]
    Template,
}

impl LifecycleStage {
    /// 全部阶段，按接入顺序排列
    pub const ALL: [LifecycleStage; 4] = [
        LifecycleStage::BeforeQuery,
        LifecycleStage::Title,
        LifecycleStage::Dispatch,
        LifecycleStage::Template,
    ];

    /// 宿主中对应的钩子名
    pub fn hook_name(self) -> &'static str {
        match self {
            LifecycleStage::BeforeQuery => "pre_get_posts",
            LifecycleStage::Title => "wp_title",
            LifecycleStage::Dispatch => "wp",
            LifecycleStage::Template => "template",
        }
    }

    /// 描述性别名
    pub fn alias(self) -> &'static str {
        match self {
            LifecycleStage::BeforeQuery => "before-query",
            LifecycleStage::Title => "title",
            LifecycleStage::Dispatch => "dispatch",
            LifecycleStage::Template => "template",
        }
    }
}

impl FromStr for LifecycleStage {
    type Err = RouteError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.hook_name() == name || stage.alias() == name)
            .ok_or_else(|| RouteError::UnknownStage(name.to_string()))
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hook_name())
    }
}
