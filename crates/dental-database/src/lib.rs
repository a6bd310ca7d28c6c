//! # 牙科订单数据库模块
//!
//! 负责订单和用户的持久化，提供PostgreSQL实现和内存实现。

pub mod connection;
pub mod memory;
pub mod models;
pub mod queries;
pub mod repository;

// 重新导出主要类型
pub use connection::DatabasePool;
pub use memory::InMemoryRepository;
pub use queries::DatabaseQueries;
pub use repository::{OrderRepository, PgRepository, UserRepository};
