//! 内存仓储实现
//!
//! 不做持久化，用于测试和未配置数据库时的开发运行。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dental_core::{
    DentalError, DentalOrder, NewDentalOrder, NewUser, OrderFilter, OrderPage, OrderStatus,
    Pagination, Result, User,
};
use tokio::sync::RwLock;

use crate::repository::{check_new_order, order_not_found, OrderRepository, UserRepository};

#[derive(Debug, Default)]
struct MemoryState {
    orders: Vec<DentalOrder>,
    users: Vec<User>,
    next_order_id: i32,
    next_user_id: i32,
}

/// 内存仓储
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepository {
    async fn create(&self, order: &NewDentalOrder, order_number: &str) -> Result<DentalOrder> {
        check_new_order(order, order_number)?;

        let mut state = self.state.write().await;
        if state.orders.iter().any(|o| o.order_number == order_number) {
            return Err(DentalError::DuplicateOrderNumber(order_number.to_string()));
        }

        state.next_order_id += 1;
        let now = Utc::now();
        let created = DentalOrder {
            id: state.next_order_id,
            order_number: order_number.to_string(),
            patient_name: order.patient_name.clone(),
            patient_id: order.patient_id.clone(),
            selected_teeth: order.selected_teeth.clone(),
            tooth_configurations: order.tooth_configurations.clone(),
            observations: order.observations.clone(),
            smile_photo_path: order.smile_photo_path.clone(),
            scanner_file_path: order.scanner_file_path.clone(),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.orders.push(created.clone());

        Ok(created)
    }

    async fn get_by_id(&self, id: i32) -> Result<DentalOrder> {
        let state = self.state.read().await;
        state
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or_else(|| order_not_found(id))
    }

    async fn list(&self, filter: &OrderFilter, pagination: Pagination) -> Result<OrderPage> {
        let state = self.state.read().await;

        let mut matching: Vec<&DentalOrder> =
            state.orders.iter().filter(|o| filter.matches(o)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = pagination.offset.max(0) as usize;
        let limit = pagination.limit.max(0) as usize;
        let orders = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|o| (*o).clone())
            .collect();

        Ok(OrderPage {
            orders,
            total: state.orders.len() as i64,
            filtered_total: matching.len() as i64,
        })
    }

    async fn update_status(&self, id: i32, status: OrderStatus) -> Result<DentalOrder> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| order_not_found(id))?;

        order.status = status;
        order.updated_at = Utc::now().max(order.updated_at);
        Ok(order.clone())
    }

    async fn count_by_status(&self) -> Result<BTreeMap<OrderStatus, i64>> {
        let state = self.state.read().await;
        let mut counts: BTreeMap<OrderStatus, i64> =
            OrderStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for order in &state.orders {
            *counts.entry(order.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(DentalError::validation("username", "Username already exists"));
        }

        state.next_user_id += 1;
        let created = User {
            id: state.next_user_id,
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            full_name: user.full_name,
            created_at: Utc::now(),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }
}
