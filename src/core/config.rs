//! 路由配置
//!
//! 定义宿主、日志和声明式路由的配置结构，以及从 YAML / JSON 文件加载的逻辑。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::host::rewrite::RewriteRule;
use crate::utils::{Result, RouteError};

/// 默认重写目标前缀
pub const DEFAULT_REWRITE_PREFIX: &str = "index.php?";

/// 宿主配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// 重写目标前缀，路由的 `rewrite` 片段拼接在其后
    #[serde(default = "default_rewrite_prefix")]
    pub rewrite_prefix: String,

    /// 宿主自带的重写规则（路由贡献的规则排在它们之前）
    #[serde(default)]
    pub base_rules: Vec<RewriteRule>,

    /// 模板搜索目录（按顺序查找）
    #[serde(default)]
    pub template_dirs: Vec<PathBuf>,

    /// 默认页面标题
    #[serde(default)]
    pub default_title: String,

    /// 默认模板名
    #[serde(default = "default_template")]
    pub default_template: String,

    /// 宿主默认识别的查询参数
    #[serde(default = "default_query_vars")]
    pub default_query_vars: Vec<String>,
}

fn default_rewrite_prefix() -> String {
    DEFAULT_REWRITE_PREFIX.to_string()
}

fn default_template() -> String {
    "index.php".to_string()
}

fn default_query_vars() -> Vec<String> {
    ["p", "page_id", "name", "pagename", "s"]
        .iter()
        .map(|v| v.to_string())
        .collect()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            rewrite_prefix: default_rewrite_prefix(),
            base_rules: vec![],
            template_dirs: vec![],
            default_title: String::new(),
            default_template: default_template(),
            default_query_vars: default_query_vars(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略（never / hourly / daily）
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
        }
    }
}

/// 声明式路由定义
///
/// 配置文件无法携带可调用对象，因此只支持 `rewrite` 与 `template` 两个选项。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// 路由模式（宿主的重写正则）
    pub pattern: String,

    /// 重写目标片段，例如 `p=123`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<String>,

    /// 命中后渲染的模板文件
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// 需要宿主识别的查询参数
    #[serde(default)]
    pub query_vars: Vec<String>,
}

impl RouteDefinition {
    /// 创建只有模式的定义
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            rewrite: None,
            template: None,
            query_vars: vec![],
        }
    }

    /// 设置重写片段
    pub fn with_rewrite(mut self, rewrite: impl Into<String>) -> Self {
        self.rewrite = Some(rewrite.into());
        self
    }

    /// 设置模板
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// 添加查询参数
    pub fn with_query_var(mut self, name: impl Into<String>) -> Self {
        self.query_vars.push(name.into());
        self
    }
}

/// 路由系统配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterSettings {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 宿主配置
    #[serde(default)]
    pub host: HostConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 声明式路由
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,

    /// 是否为开发模式
    #[serde(default)]
    pub dev_mode: bool,
}

impl RouterSettings {
    /// 创建配置构建器
    pub fn builder() -> RouterSettingsBuilder {
        RouterSettingsBuilder::default()
    }

    /// 从文件加载配置
    ///
    /// 扩展名为 `.json` 时按 JSON 解析，否则按 YAML 解析。
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            RouteError::ConfigLoadFailed(format!("{}: {}", path.display(), e))
        })?;

        let mut settings: RouterSettings =
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                serde_json::from_str(&content)?
            } else {
                serde_yaml::from_str(&content)?
            };

        settings.config_path = Some(path);
        Ok(settings)
    }

    /// 校验配置
    ///
    /// 检查路由模式非空、互不重复且可编译为正则，查询参数名非空。
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for (index, route) in self.routes.iter().enumerate() {
            if route.pattern.is_empty() {
                return Err(RouteError::InvalidConfigValue {
                    key: format!("routes[{}].pattern", index),
                    reason: "路由模式不能为空".to_string(),
                });
            }

            if !seen.insert(route.pattern.as_str()) {
                return Err(RouteError::RouteAlreadyExists(route.pattern.clone()));
            }

            regex::Regex::new(&route.pattern).map_err(|source| RouteError::InvalidRewriteRule {
                pattern: route.pattern.clone(),
                source,
            })?;

            if matches!(route.template.as_deref(), Some(t) if t.trim().is_empty()) {
                return Err(RouteError::InvalidConfigValue {
                    key: format!("routes[{}].template", index),
                    reason: "模板名不能为空".to_string(),
                });
            }

            if let Some(position) = route.query_vars.iter().position(|v| v.trim().is_empty()) {
                return Err(RouteError::InvalidConfigValue {
                    key: format!("routes[{}].query_vars[{}]", index, position),
                    reason: "查询参数名不能为空".to_string(),
                });
            }
        }

        for rule in &self.host.base_rules {
            regex::Regex::new(&rule.pattern).map_err(|source| RouteError::InvalidRewriteRule {
                pattern: rule.pattern.clone(),
                source,
            })?;
        }

        Ok(())
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct RouterSettingsBuilder {
    settings: RouterSettings,
}

impl RouterSettingsBuilder {
    /// 设置重写目标前缀
    pub fn rewrite_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings.host.rewrite_prefix = prefix.into();
        self
    }

    /// 添加宿主自带的重写规则
    pub fn base_rule(mut self, pattern: impl Into<String>, target: impl Into<String>) -> Self {
        self.settings.host.base_rules.push(RewriteRule::new(pattern, target));
        self
    }

    /// 添加模板目录
    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.host.template_dirs.push(dir.into());
        self
    }

    /// 设置默认标题
    pub fn default_title(mut self, title: impl Into<String>) -> Self {
        self.settings.host.default_title = title.into();
        self
    }

    /// 添加声明式路由
    pub fn route(mut self, definition: RouteDefinition) -> Self {
        self.settings.routes.push(definition);
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.settings.logging.level = level.into();
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.settings.logging.json_format = true;
        self
    }

    /// 启用开发模式
    pub fn dev_mode(mut self) -> Self {
        self.settings.dev_mode = true;
        self
    }

    /// 构建配置
    pub fn build(self) -> RouterSettings {
        self.settings
    }
}
