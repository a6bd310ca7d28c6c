//! # 牙科订单工作流模块
//!
//! 提供订单业务流程管理功能，包括：
//! - 状态机：描述订单状态的常规流转路径
//! - 订单服务：串联验证、订单号分配、持久化和状态更新

pub mod service;
pub mod state_machine;

// 重新导出主要类型
pub use service::{OrderNumberGenerator, OrderService, MAX_CREATE_ATTEMPTS};
pub use state_machine::{OrderStateMachine, TransitionKind};
