//! 路由适配器错误类型定义
//!
//! 本模块定义了路由注册、钩子分发与宿主请求周期中使用的所有错误类型。

use thiserror::Error;

/// 路由适配器核心错误类型
#[derive(Error, Debug)]
pub enum RouteError {
    // ==================== 回调包错误 ====================

    /// 未知的生命周期阶段
    #[error("未知的生命周期阶段: '{0}'")]
    UnknownStage(String),

    /// 回调包内容无效
    #[error("回调包无效: {0}")]
    InvalidBundle(String),

    /// 指定阶段没有回调
    #[error("回调未找到: 路由 '{pattern}' 没有 '{stage}' 阶段的回调")]
    CallbackNotFound {
        /// 路由模式
        pattern: String,
        /// 缺少回调的阶段
        stage: String,
    },

    /// 回调执行失败
    #[error("回调执行失败: {0}")]
    CallbackFailed(String),

    // ==================== 路由错误 ====================

    /// 路由已存在
    #[error("路由已存在: pattern '{0}'")]
    RouteAlreadyExists(String),

    /// 路由未找到
    #[error("路由未找到: pattern '{0}'")]
    RouteNotFound(String),

    /// 重写规则无法编译
    #[error("重写规则无效: '{pattern}' - {source}")]
    InvalidRewriteRule {
        /// 规则模式
        pattern: String,
        /// 正则编译错误
        #[source]
        source: regex::Error,
    },

    /// 模板未找到
    #[error("模板未找到: '{0}'")]
    TemplateNotFound(String),

    // ==================== 钩子错误 ====================

    /// 钩子注册失败
    #[error("钩子注册失败: hook '{hook}' - {reason}")]
    RegistrationFailed {
        /// 钩子名
        hook: String,
        /// 失败原因
        reason: String,
    },

    /// 钩子传入的值无法解析
    #[error("钩子参数无效: hook '{hook}' - {reason}")]
    InvalidHookValue {
        /// 钩子名
        hook: String,
        /// 解析失败原因
        reason: String,
    },

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        /// 配置键
        key: String,
        /// 无效原因
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ==================== 通用错误 ====================

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 路由操作结果类型别名
pub type Result<T> = std::result::Result<T, RouteError>;

/// 状态码常量
pub mod status_code {
    /// 成功
    pub const OK: u16 = 200;

    /// 请求格式错误
    pub const BAD_REQUEST: u16 = 400;

    /// 未找到
    pub const NOT_FOUND: u16 = 404;

    /// 冲突
    pub const CONFLICT: u16 = 409;

    /// 内部错误
    pub const INTERNAL_ERROR: u16 = 500;
}

/// 错误码常量
pub mod error_code {
    // 回调包错误 (BUNDLE-xxx)
    /// 未知阶段
    pub const BUNDLE_UNKNOWN_STAGE: &str = "BUNDLE-001";
    /// 回调包无效
    pub const BUNDLE_INVALID: &str = "BUNDLE-002";
    /// 回调未找到
    pub const BUNDLE_CALLBACK_NOT_FOUND: &str = "BUNDLE-003";
    /// 回调执行失败
    pub const BUNDLE_CALLBACK_FAILED: &str = "BUNDLE-004";

    // 路由错误 (ROUTE-xxx)
    /// 路由已存在
    pub const ROUTE_ALREADY_EXISTS: &str = "ROUTE-001";
    /// 路由未找到
    pub const ROUTE_NOT_FOUND: &str = "ROUTE-002";
    /// 重写规则无效
    pub const ROUTE_INVALID_REWRITE: &str = "ROUTE-003";
    /// 模板未找到
    pub const ROUTE_TEMPLATE_NOT_FOUND: &str = "ROUTE-004";

    // 钩子错误 (HOOK-xxx)
    /// 钩子注册失败
    pub const HOOK_REGISTRATION_FAILED: &str = "HOOK-001";
    /// 钩子参数无效
    pub const HOOK_INVALID_VALUE: &str = "HOOK-002";

    // 配置错误 (CONFIG-xxx)
    /// 配置加载失败
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    /// 配置值无效
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";
}

impl RouteError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            RouteError::UnknownStage(_) => error_code::BUNDLE_UNKNOWN_STAGE,
            RouteError::InvalidBundle(_) => error_code::BUNDLE_INVALID,
            RouteError::CallbackNotFound { .. } => error_code::BUNDLE_CALLBACK_NOT_FOUND,
            RouteError::CallbackFailed(_) => error_code::BUNDLE_CALLBACK_FAILED,
            RouteError::RouteAlreadyExists(_) => error_code::ROUTE_ALREADY_EXISTS,
            RouteError::RouteNotFound(_) => error_code::ROUTE_NOT_FOUND,
            RouteError::InvalidRewriteRule { .. } => error_code::ROUTE_INVALID_REWRITE,
            RouteError::TemplateNotFound(_) => error_code::ROUTE_TEMPLATE_NOT_FOUND,
            RouteError::RegistrationFailed { .. } => error_code::HOOK_REGISTRATION_FAILED,
            RouteError::InvalidHookValue { .. } => error_code::HOOK_INVALID_VALUE,
            RouteError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            RouteError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            _ => "UNKNOWN",
        }
    }

    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            RouteError::RouteNotFound(_) => status_code::NOT_FOUND,
            RouteError::TemplateNotFound(_) => status_code::NOT_FOUND,
            RouteError::RouteAlreadyExists(_) => status_code::CONFLICT,
            RouteError::UnknownStage(_) => status_code::BAD_REQUEST,
            RouteError::InvalidBundle(_) => status_code::BAD_REQUEST,
            RouteError::InvalidHookValue { .. } => status_code::BAD_REQUEST,
            _ => status_code::INTERNAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouteError::CallbackNotFound {
            pattern: "shop(/)?".to_string(),
            stage: "wp_title".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("shop(/)?"));
        assert!(message.contains("wp_title"));
    }

    #[test]
    fn test_error_code() {
        let err = RouteError::UnknownStage("after-query".to_string());
        assert_eq!(err.error_code(), error_code::BUNDLE_UNKNOWN_STAGE);

        let err = RouteError::InitFailed("logger".to_string());
        assert_eq!(err.error_code(), "UNKNOWN");
    }

    #[test]
    fn test_status_code() {
        let err = RouteError::TemplateNotFound("stripe.php".to_string());
        assert_eq!(err.status_code(), status_code::NOT_FOUND);

        let err = RouteError::RouteAlreadyExists("x/?$".to_string());
        assert_eq!(err.status_code(), status_code::CONFLICT);
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: RouteError = anyhow::anyhow!("回调内部失败").into();
        assert!(matches!(err, RouteError::Other(_)));
        assert_eq!(err.status_code(), status_code::INTERNAL_ERROR);
    }
}
