//! 订单状态机
//!
//! 管理订单从接收到交付的状态转换

use dental_core::{OrderStatus, Result};
use serde::Serialize;
use std::collections::HashSet;

/// 状态更新的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransitionKind {
    /// 与当前状态相同，仍会刷新更新时间
    Unchanged,
    /// 符合预期流程
    Intended,
    /// 存储层允许但不在预期流程中（例如从已完成改回待处理）
    Unusual,
}

/// 订单状态机
#[derive(Debug)]
pub struct OrderStateMachine {
    transitions: HashSet<(OrderStatus, OrderStatus)>,
}

impl OrderStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashSet::new();

        // 定义预期的状态转换规则
        transitions.insert((OrderStatus::Pending, OrderStatus::InProgress));
        transitions.insert((OrderStatus::InProgress, OrderStatus::Completed));
        transitions.insert((OrderStatus::Pending, OrderStatus::Cancelled));
        transitions.insert((OrderStatus::InProgress, OrderStatus::Cancelled));

        Self { transitions }
    }

    /// 解析客户端提交的状态值，枚举外的值返回 InvalidStatus
    pub fn parse_status(&self, raw: &str) -> Result<OrderStatus> {
        raw.parse()
    }

    /// 是否属于预期流程（相同状态视为允许）
    pub fn is_intended_transition(&self, from: OrderStatus, to: OrderStatus) -> bool {
        from == to || self.transitions.contains(&(from, to))
    }

    /// 对一次状态更新分类；存储层不会拒绝任何合法状态
    pub fn classify(&self, from: OrderStatus, to: OrderStatus) -> TransitionKind {
        if from == to {
            TransitionKind::Unchanged
        } else if self.transitions.contains(&(from, to)) {
            TransitionKind::Intended
        } else {
            TransitionKind::Unusual
        }
    }

    /// 流程上的终止状态
    pub fn is_terminal(status: OrderStatus) -> bool {
        matches!(status, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// 获取所有可能的状态
    pub fn get_all_states() -> Vec<OrderStatus> {
        OrderStatus::ALL.to_vec()
    }

    /// 当前状态按预期流程可以进入的状态
    pub fn get_next_states(&self, current: OrderStatus) -> Vec<OrderStatus> {
        let mut next: Vec<OrderStatus> = self
            .transitions
            .iter()
            .filter(|(from, _)| *from == current)
            .map(|(_, to)| *to)
            .collect();
        next.sort();
        next
    }
}

impl Default for OrderStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
