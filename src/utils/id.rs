//! 标识符生成
//!
//! - 监听器 ID：10 位 62 进制字符串（0-9, a-z, A-Z），在注册表内唯一
//! - 请求 ID：UUID v4

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 监听器 ID 长度
const LISTENER_ID_LENGTH: usize = 10;

/// 监听器 ID
///
/// 每次调用 [`EventRegistry::on`](crate::router::EventRegistry::on) 都会返回一个新的 ID。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(String);

impl ListenerId {
    /// 生成新的监听器 ID
    ///
    /// # Example
    ///
    /// ```
    /// use plain_routes::utils::id::ListenerId;
    ///
    /// let id = ListenerId::generate();
    /// assert_eq!(id.as_str().len(), 10);
    /// ```
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(LISTENER_ID_LENGTH)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// 从字符串解析（带格式验证）
    pub fn parse(id: &str) -> Option<Self> {
        if is_valid_listener_id(id) {
            Some(Self(id.to_string()))
        } else {
            None
        }
    }

    /// 以字符串切片形式访问
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 验证监听器 ID 格式
///
/// ```
/// use plain_routes::utils::id::is_valid_listener_id;
///
/// assert!(is_valid_listener_id("a1B2c3D4e5"));
/// assert!(!is_valid_listener_id("a1B2-3D4e5"));
/// ```
pub fn is_valid_listener_id(id: &str) -> bool {
    id.len() == LISTENER_ID_LENGTH && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// 生成请求 ID（UUID v4）
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
