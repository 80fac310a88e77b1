//! 回调包
//!
//! 回调包把生命周期阶段映射到可调用对象，另外携带可选的重写片段和模板名。
//! 构造时即校验键名：阶段以外的名字返回 `UnknownStage`，`template` 阶段只能是模板名。

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::event::HookArgs;
use super::stage::{LifecycleStage, REWRITE_KEY};
use crate::core::config::RouteDefinition;
use crate::utils::{Result, RouteError};

/// 阶段回调
pub type Callback = Arc<dyn Fn(HookArgs) -> Result<Value> + Send + Sync>;

/// 回调包
#[derive(Clone, Default)]
pub struct CallbackBundle {
    rewrite: Option<String>,
    template: Option<String>,
    callbacks: HashMap<LifecycleStage, Callback>,
}

impl CallbackBundle {
    /// 空回调包
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建构建器
    pub fn builder() -> BundleBuilder {
        BundleBuilder::default()
    }

    /// 从声明式定义创建（只含 rewrite 和 template）
    pub fn from_definition(definition: &RouteDefinition) -> Self {
        Self {
            rewrite: definition.rewrite.clone(),
            template: definition.template.clone(),
            callbacks: HashMap::new(),
        }
    }

    /// 重写片段
    pub fn rewrite(&self) -> Option<&str> {
        self.rewrite.as_deref()
    }

    /// 模板名
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// 指定阶段的回调
    pub fn callback(&self, stage: LifecycleStage) -> Option<&Callback> {
        self.callbacks.get(&stage)
    }

    /// 回调包是否包含该阶段
    pub fn has_stage(&self, stage: LifecycleStage) -> bool {
        match stage {
            LifecycleStage::Template => self.template.is_some(),
            _ => self.callbacks.contains_key(&stage),
        }
    }

    /// 包含的阶段，按接入顺序
    pub fn stages(&self) -> Vec<LifecycleStage> {
        LifecycleStage::ALL
            .into_iter()
            .filter(|stage| self.has_stage(*stage))
            .collect()
    }

    /// 可序列化的摘要
    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            rewrite: self.rewrite.clone(),
            template: self.template.clone(),
            stages: self.stages(),
        }
    }
}

impl fmt::Debug for CallbackBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackBundle")
            .field("rewrite", &self.rewrite)
            .field("template", &self.template)
            .field("stages", &self.stages())
            .finish()
    }
}

/// 回调包摘要
///
/// 路由接入后作为 `plain_routes` 通知的载荷。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleSummary {
    /// 重写片段
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<String>,
    /// 模板名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// 包含的阶段
    pub stages: Vec<LifecycleStage>,
}

/// 回调包构建器
///
/// ```
/// use plain_routes::router::CallbackBundle;
/// use serde_json::Value;
///
/// let bundle = CallbackBundle::builder()
///     .rewrite("p=123")
///     .on("pre_get_posts", |_args| Ok(Value::Null))
///     .build()
///     .unwrap();
/// assert_eq!(bundle.rewrite(), Some("p=123"));
/// ```
#[derive(Default)]
pub struct BundleBuilder {
    rewrite: Option<String>,
    template: Option<String>,
    entries: Vec<(String, Callback)>,
}

impl BundleBuilder {
    /// 设置重写片段
    pub fn rewrite(mut self, rewrite: impl Into<String>) -> Self {
        self.rewrite = Some(rewrite.into());
        self
    }

    /// 设置模板名
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// 按名字添加阶段回调（名字在 `build` 时校验）
    pub fn on<F>(mut self, stage: impl Into<String>, callback: F) -> Self
    where
        F: Fn(HookArgs) -> Result<Value> + Send + Sync + 'static,
    {
        self.entries.push((stage.into(), Arc::new(callback)));
        self
    }

    /// 构建并校验
    ///
    /// # 错误
    ///
    /// - 未知阶段名：`RouteError::UnknownStage`
    /// - `rewrite` / `template` 被当作回调、或同一阶段出现两次：`RouteError::InvalidBundle`
    pub fn build(self) -> Result<CallbackBundle> {
        let mut callbacks = HashMap::new();

        for (name, callback) in self.entries {
            if name == REWRITE_KEY {
                return Err(RouteError::InvalidBundle(
                    "rewrite 是重写片段，不能注册为回调".to_string(),
                ));
            }

            let stage: LifecycleStage = name.parse()?;
            if stage == LifecycleStage::Template {
                return Err(RouteError::InvalidBundle(
                    "template 阶段需要模板名，请使用 template()".to_string(),
                ));
            }

            if callbacks.insert(stage, callback).is_some() {
                return Err(RouteError::InvalidBundle(format!(
                    "阶段 '{}' 重复注册",
                    stage
                )));
            }
        }

        if matches!(self.template.as_deref(), Some(t) if t.trim().is_empty()) {
            return Err(RouteError::InvalidBundle("模板名不能为空".to_string()));
        }

        Ok(CallbackBundle {
            rewrite: self.rewrite,
            template: self.template,
            callbacks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_accepts_names_and_aliases() {
        let bundle = CallbackBundle::builder()
            .on("pre_get_posts", |_| Ok(Value::Null))
            .on("title", |_| Ok(json!("T")))
            .template("stripe.php")
            .build()
            .unwrap();

        assert_eq!(
            bundle.stages(),
            vec![LifecycleStage::BeforeQuery, LifecycleStage::Title, LifecycleStage::Template]
        );
        assert!(!bundle.has_stage(LifecycleStage::Dispatch));
        let title = bundle.callback(LifecycleStage::Title).unwrap();
        assert_eq!(title(vec![]).unwrap(), json!("T"));
    }

    #[test]
    fn test_unknown_stage_rejected() {
        let result = CallbackBundle::builder()
            .on("after_query", |_| Ok(Value::Null))
            .build();
        assert!(matches!(result, Err(RouteError::UnknownStage(name)) if name == "after_query"));
    }

    #[test]
    fn test_template_callback_rejected() {
        let result = CallbackBundle::builder()
            .on("template", |_| Ok(Value::Null))
            .build();
        assert!(matches!(result, Err(RouteError::InvalidBundle(_))));

        let result = CallbackBundle::builder()
            .on("rewrite", |_| Ok(Value::Null))
            .build();
        assert!(matches!(result, Err(RouteError::InvalidBundle(_))));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let result = CallbackBundle::builder()
            .on("wp", |_| Ok(Value::Null))
            .on("dispatch", |_| Ok(Value::Null))
            .build();
        assert!(matches!(result, Err(RouteError::InvalidBundle(_))));
    }

    #[test]
    fn test_from_definition_and_summary() {
        let definition = RouteDefinition::new("shop(/)?").with_rewrite("p=1");
        let bundle = CallbackBundle::from_definition(&definition);

        assert_eq!(bundle.rewrite(), Some("p=1"));
        assert!(bundle.stages().is_empty());
        assert_eq!(
            serde_json::to_value(bundle.summary()).unwrap(),
            json!({"rewrite": "p=1", "stages": []})
        );
    }
}
