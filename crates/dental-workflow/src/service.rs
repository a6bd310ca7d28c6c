//! 订单服务
//!
//! 协调验证器、订单号生成、状态机和仓储，提供统一的订单操作接口

use std::collections::BTreeMap;
use std::sync::Arc;

use dental_core::utils::generate_order_number;
use dental_core::{
    DentalError, DentalOrder, NewDentalOrder, OrderFilter, OrderPage, OrderStatus,
    OrderValidator, Pagination, Result,
};
use dental_database::OrderRepository;
use serde_json::Value;

use crate::state_machine::{OrderStateMachine, TransitionKind};

/// 订单号冲突时的最大尝试次数
pub const MAX_CREATE_ATTEMPTS: usize = 3;

/// 订单号生成函数
pub type OrderNumberGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// 订单服务
pub struct OrderService {
    repository: Arc<dyn OrderRepository>,
    validator: OrderValidator,
    state_machine: OrderStateMachine,
    number_generator: OrderNumberGenerator,
    max_create_attempts: usize,
}

impl OrderService {
    /// 创建新的订单服务
    pub fn new(repository: Arc<dyn OrderRepository>) -> Self {
        Self {
            repository,
            validator: OrderValidator::new(),
            state_machine: OrderStateMachine::new(),
            number_generator: Arc::new(generate_order_number),
            max_create_attempts: MAX_CREATE_ATTEMPTS,
        }
    }

    /// 替换订单号生成函数
    pub fn with_number_generator(mut self, generator: OrderNumberGenerator) -> Self {
        self.number_generator = generator;
        self
    }

    pub fn validator(&self) -> &OrderValidator {
        &self.validator
    }

    pub fn state_machine(&self) -> &OrderStateMachine {
        &self.state_machine
    }

    /// 校验原始提交数据并创建订单
    pub async fn create_order(&self, payload: &Value) -> Result<DentalOrder> {
        let order = self.validator.validate(payload).map_err(|e| {
            tracing::warn!("Rejected dental order submission: {}", e);
            e
        })?;
        self.create_validated(order).await
    }

    /// 为已验证的订单分配订单号并持久化
    ///
    /// 每次尝试都重新生成订单号；冲突超过上限后返回 DuplicateOrderNumber。
    pub async fn create_validated(&self, order: NewDentalOrder) -> Result<DentalOrder> {
        let mut attempt = 1;
        loop {
            let order_number = (self.number_generator)();
            match self.repository.create(&order, &order_number).await {
                Ok(created) => {
                    tracing::info!(
                        "Created dental order {} (id {}) for patient {}",
                        created.order_number,
                        created.id,
                        created.patient_name
                    );
                    return Ok(created);
                }
                Err(e) if e.is_retryable() && attempt < self.max_create_attempts => {
                    tracing::warn!(
                        "Order number collision on {} (attempt {}), regenerating",
                        order_number,
                        attempt
                    );
                    attempt += 1;
                }
                Err(e) => {
                    if !matches!(e, DentalError::Validation { .. }) {
                        tracing::error!("Failed to create dental order: {}", e);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// 根据ID获取订单
    pub async fn get_order(&self, id: i32) -> Result<DentalOrder> {
        self.repository.get_by_id(id).await
    }

    /// 分页查询订单
    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<OrderPage> {
        tracing::debug!("Listing dental orders: {:?} {:?}", filter, pagination);
        self.repository.list(filter, pagination).await
    }

    /// 更新订单状态
    ///
    /// 非法状态值在访问存储之前被拒绝。并发更新按最后写入为准。
    pub async fn update_status(&self, id: i32, raw_status: &str) -> Result<DentalOrder> {
        let status = self.state_machine.parse_status(raw_status).map_err(|e| {
            tracing::warn!("Rejected status update for order {}: {}", id, raw_status);
            e
        })?;

        let current = self.repository.get_by_id(id).await?;
        if self.state_machine.classify(current.status, status) == TransitionKind::Unusual {
            tracing::warn!(
                "Order {} moved outside the usual flow: {} -> {}",
                current.order_number,
                current.status,
                status
            );
        }

        let updated = self.repository.update_status(id, status).await?;
        tracing::info!(
            "Order {} status updated: {} -> {}",
            updated.order_number,
            current.status,
            updated.status
        );
        Ok(updated)
    }

    /// 各状态订单数量
    pub async fn status_counts(&self) -> Result<BTreeMap<OrderStatus, i64>> {
        self.repository.count_by_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dental_core::utils::is_valid_order_number;
    use dental_database::InMemoryRepository;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service() -> OrderService {
        OrderService::new(Arc::new(InMemoryRepository::new()))
    }

    fn maria() -> Value {
        json!({
            "patientName": "Maria Silva",
            "selectedTeeth": [
                { "number": "11", "name": "11 - Incisivo Central", "id": "tooth_11_1" },
                { "number": "21", "name": "21 - Incisivo Central", "id": "tooth_21_1" }
            ],
            "toothConfigurations": {}
        })
    }

    #[tokio::test]
    async fn test_order_lifecycle() {
        let service = service();

        let created = service.create_order(&maria()).await.unwrap();
        assert_eq!(created.status, OrderStatus::Pending);
        assert!(is_valid_order_number(&created.order_number));
        assert_eq!(created.created_at, created.updated_at);

        let updated = service.update_status(created.id, "in_progress").await.unwrap();
        assert_eq!(updated.status, OrderStatus::InProgress);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);

        let fetched = service.get_order(created.id).await.unwrap();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn test_invalid_submission_not_persisted() {
        let service = service();

        let mut body = maria();
        body["selectedTeeth"] = json!([]);
        let err = service.create_order(&body).await.unwrap_err();
        assert_eq!(err.field(), Some("selectedTeeth"));

        let mut body = maria();
        body["patientName"] = json!("   ");
        assert!(service.create_order(&body).await.is_err());

        let page = service
            .list_orders(&OrderFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_invalid_status_leaves_order_unchanged() {
        let service = service();
        let created = service.create_order(&maria()).await.unwrap();

        let err = service.update_status(created.id, "done").await.unwrap_err();
        assert!(matches!(err, DentalError::InvalidStatus(_)));

        let fetched = service.get_order(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_update_missing_order() {
        let err = service().update_status(42, "completed").await.unwrap_err();
        assert!(matches!(err, DentalError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_same_status_update_refreshes_timestamp() {
        let service = service();
        let created = service.create_order(&maria()).await.unwrap();

        let first = service.update_status(created.id, "pending").await.unwrap();
        let second = service.update_status(created.id, "pending").await.unwrap();
        assert_eq!(first.status, OrderStatus::Pending);
        assert_eq!(second.status, OrderStatus::Pending);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_unusual_transition_is_allowed() {
        let service = service();
        let created = service.create_order(&maria()).await.unwrap();
        service.update_status(created.id, "completed").await.unwrap();

        let reopened = service.update_status(created.id, "pending").await.unwrap();
        assert_eq!(reopened.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_collision_is_retried_with_new_number() {
        let repository = Arc::new(InMemoryRepository::new());
        let fixed = "ORD-1700000000000-AAAAAAAAA".to_string();
        repository
            .create(
                &OrderValidator::new().validate(&maria()).unwrap(),
                &fixed,
            )
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let generator: OrderNumberGenerator = Arc::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                "ORD-1700000000000-AAAAAAAAA".to_string()
            } else {
                generate_order_number()
            }
        });

        let service = OrderService::new(repository).with_number_generator(generator);
        let created = service.create_order(&maria()).await.unwrap();
        assert_ne!(created.order_number, fixed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_collision_surfaces_after_max_attempts() {
        let repository = Arc::new(InMemoryRepository::new());
        let fixed = "ORD-1700000000000-BBBBBBBBB";
        repository
            .create(&OrderValidator::new().validate(&maria()).unwrap(), fixed)
            .await
            .unwrap();

        let service = OrderService::new(repository)
            .with_number_generator(Arc::new(move || fixed.to_string()));
        let err = service.create_order(&maria()).await.unwrap_err();
        assert!(matches!(err, DentalError::DuplicateOrderNumber(_)));
    }

    #[tokio::test]
    async fn test_status_counts() {
        let service = service();
        let created = service.create_order(&maria()).await.unwrap();
        service.create_order(&maria()).await.unwrap();
        service.update_status(created.id, "completed").await.unwrap();

        let counts = service.status_counts().await.unwrap();
        assert_eq!(counts[&OrderStatus::Pending], 1);
        assert_eq!(counts[&OrderStatus::Completed], 1);
    }
}
