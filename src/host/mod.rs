//! 宿主模块
//!
//! 参考宿主：重写规则表、模板定位和请求生命周期运行时。
//! 路由适配器只通过钩子与这里交互。

pub mod rewrite;
pub mod runtime;
pub mod template;

pub use rewrite::{prepend_rule, RewriteMatch, RewriteRule, RewriteTable};
pub use runtime::{HostResponse, HostRuntime};
pub use template::{DirectoryTemplateLocator, StaticTemplateLocator, TemplateLocator};
