//! 模板定位
//!
//! 路由只知道模板的文件名，由宿主提供的 [`TemplateLocator`] 把文件名解析为路径并读取内容。
//! 这里不包含任何模板引擎：模板内容原样作为响应体。

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

use crate::utils::{Result, RouteError};

/// 模板定位能力
#[async_trait]
pub trait TemplateLocator: Send + Sync {
    /// 把模板名解析为路径
    ///
    /// 找不到时返回 `RouteError::TemplateNotFound`
    async fn locate(&self, name: &str) -> Result<PathBuf>;

    /// 读取模板内容
    async fn include(&self, path: &Path) -> Result<String>;
}

/// 模板名只能是相对路径，且不能向上跳出模板目录
fn is_safe_template_name(name: &str) -> bool {
    let path = Path::new(name);
    !name.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// 按目录顺序查找模板文件
#[derive(Debug, Clone, Default)]
pub struct DirectoryTemplateLocator {
    dirs: Vec<PathBuf>,
}

impl DirectoryTemplateLocator {
    /// 创建定位器
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// 搜索目录
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

#[async_trait]
impl TemplateLocator for DirectoryTemplateLocator {
    async fn locate(&self, name: &str) -> Result<PathBuf> {
        if !is_safe_template_name(name) {
            return Err(RouteError::TemplateNotFound(name.to_string()));
        }

        for dir in &self.dirs {
            let candidate = dir.join(name);
            trace!(candidate = %candidate.display(), "查找模板");
            match tokio::fs::metadata(&candidate).await {
                Ok(metadata) if metadata.is_file() => {
                    debug!(template = %name, path = %candidate.display(), "模板已定位");
                    return Ok(candidate);
                }
                _ => continue,
            }
        }

        Err(RouteError::TemplateNotFound(name.to_string()))
    }

    async fn include(&self, path: &Path) -> Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// 内存中的模板集合
#[derive(Debug, Clone, Default)]
pub struct StaticTemplateLocator {
    templates: HashMap<String, String>,
}

impl StaticTemplateLocator {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加模板
    pub fn with_template(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.templates.insert(name.into(), body.into());
        self
    }
}

#[async_trait]
impl TemplateLocator for StaticTemplateLocator {
    async fn locate(&self, name: &str) -> Result<PathBuf> {
        if self.templates.contains_key(name) {
            Ok(PathBuf::from(name))
        } else {
            Err(RouteError::TemplateNotFound(name.to_string()))
        }
    }

    async fn include(&self, path: &Path) -> Result<String> {
        let name = path.to_string_lossy();
        self.templates
            .get(name.as_ref())
            .cloned()
            .ok_or_else(|| RouteError::TemplateNotFound(name.into_owned()))
    }
}
