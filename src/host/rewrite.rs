//! 重写规则表
//!
//! 宿主侧的路径解析：规则按顺序尝试，第一个匹配的规则胜出。
//! 路由适配器只贡献规则，从不在这里之外执行正则匹配。

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::utils::{Result, RouteError};

/// 重写规则：路径模式 -> 内部查询目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    /// 路径模式（正则，匹配时锚定在路径开头）
    pub pattern: String,

    /// 目标，例如 `index.php?p=123&x_id=$matches[1]`
    pub target: String,
}

impl RewriteRule {
    /// 创建规则
    pub fn new(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            target: target.into(),
        }
    }
}

/// 把规则放到表头
///
/// 表中已有相同模式的规则会被移除，新规则优先。
pub fn prepend_rule(rules: Vec<RewriteRule>, rule: RewriteRule) -> Vec<RewriteRule> {
    let mut merged = Vec::with_capacity(rules.len() + 1);
    merged.extend(rules.into_iter().filter(|r| r.pattern != rule.pattern));
    merged.insert(0, rule);
    merged
}

/// 一次成功的路径解析
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteMatch {
    /// 匹配到的规则（原始模式字符串）
    pub matched_rule: String,

    /// 展开 `$matches[N]` 后的目标
    pub target: String,

    /// 目标中 `?` 之后的查询参数，保持原顺序
    pub query: Vec<(String, String)>,
}

struct CompiledRule {
    rule: RewriteRule,
    regex: Regex,
}

/// 编译后的重写规则表
pub struct RewriteTable {
    rules: Vec<CompiledRule>,
}

impl RewriteTable {
    /// 编译规则表
    ///
    /// # 错误
    ///
    /// 任一模式无法编译时返回 `RouteError::InvalidRewriteRule`
    pub fn compile(rules: Vec<RewriteRule>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let regex = Regex::new(&format!("^(?:{})", rule.pattern)).map_err(|source| {
                    RouteError::InvalidRewriteRule {
                        pattern: rule.pattern.clone(),
                        source,
                    }
                })?;
                Ok(CompiledRule { rule, regex })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// 解析路径
    ///
    /// 路径两端的 `/` 会先被去掉；没有规则匹配时返回 `None`。
    pub fn resolve(&self, path: &str) -> Option<RewriteMatch> {
        let request_match = path.trim_matches('/');

        self.rules.iter().find_map(|compiled| {
            let captures = compiled.regex.captures(request_match)?;
            let target = expand_target(&compiled.rule.target, &captures);
            let query = parse_query(&target);
            Some(RewriteMatch {
                matched_rule: compiled.rule.pattern.clone(),
                target,
                query,
            })
        })
    }

    /// 按匹配顺序列出规则
    pub fn rules(&self) -> impl Iterator<Item = &RewriteRule> {
        self.rules.iter().map(|compiled| &compiled.rule)
    }

    /// 规则数量
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn matches_placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$matches\[(\d+)\]").expect("placeholder regex is valid")
    })
}

/// 把目标中的 `$matches[N]` 替换为第 N 个捕获组，不存在的组替换为空串
fn expand_target(target: &str, captures: &Captures<'_>) -> String {
    matches_placeholder()
        .replace_all(target, |placeholder: &Captures<'_>| {
            placeholder[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| captures.get(index))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        })
        .into_owned()
}

/// 解析目标中 `?` 之后的查询参数
fn parse_query(target: &str) -> Vec<(String, String)> {
    let Some((_, query)) = target.split_once('?') else {
        return vec![];
    };

    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend_replaces_same_pattern() {
        let rules = vec![
            RewriteRule::new("shop(/)?", "index.php?p=1"),
            RewriteRule::new("blog/?$", "index.php?page_id=2"),
        ];
        let merged = prepend_rule(rules, RewriteRule::new("shop(/)?", "index.php?p=9"));

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], RewriteRule::new("shop(/)?", "index.php?p=9"));
        assert_eq!(merged[1].pattern, "blog/?$");
    }

    #[test]
    fn test_first_match_wins() {
        let table = RewriteTable::compile(vec![
            RewriteRule::new("shop/([^/]+)/?$", "index.php?product=$matches[1]"),
            RewriteRule::new("shop(/)?", "index.php?p=1"),
        ])
        .unwrap();

        let m = table.resolve("/shop/boots/").unwrap();
        assert_eq!(m.matched_rule, "shop/([^/]+)/?$");
        assert_eq!(m.query, vec![("product".to_string(), "boots".to_string())]);

        let m = table.resolve("/shop").unwrap();
        assert_eq!(m.matched_rule, "shop(/)?");
        assert_eq!(m.target, "index.php?p=1");
    }

    #[test]
    fn test_anchored_at_start() {
        let table = RewriteTable::compile(vec![RewriteRule::new("shop(/)?", "index.php?p=1")]).unwrap();
        assert!(table.resolve("/my-shop").is_none());
    }

    #[test]
    fn test_missing_capture_expands_empty() {
        let table =
            RewriteTable::compile(vec![RewriteRule::new("x/?$", "index.php?x_id=$matches[3]")]).unwrap();
        let m = table.resolve("x").unwrap();
        assert_eq!(m.target, "index.php?x_id=");
        assert_eq!(m.query, vec![("x_id".to_string(), String::new())]);
    }

    #[test]
    fn test_target_without_query() {
        let table = RewriteTable::compile(vec![RewriteRule::new("stripe(/)?", "index.php?")]).unwrap();
        let m = table.resolve("stripe/").unwrap();
        assert!(m.query.is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let result = RewriteTable::compile(vec![RewriteRule::new("shop(/?", "index.php?")]);
        assert!(matches!(
            result,
            Err(RouteError::InvalidRewriteRule { pattern, .. }) if pattern == "shop(/?"
        ));
    }
}
