//! API 模块
//!
//! 对外提供的 SDK 接口。
//!
//! # 示例
//!
//! ```rust,no_run
//! use plain_routes::{PlainRoutes, RouterSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = RouterSettings::from_file("plain-routes.yaml").await?;
//!     let routes = PlainRoutes::new(settings).await?;
//!
//!     let response = routes.handle("/stripe/").await?;
//!     println!("{} {:?}", response.status, response.template);
//!     Ok(())
//! }
//! ```

pub mod sdk;

// 重导出主要类型
pub use sdk::{PlainRoutes, PlainRoutesStats};
