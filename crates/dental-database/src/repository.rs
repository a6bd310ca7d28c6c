//! 订单与用户仓储接口
//!
//! 仓储独占订单的持久化状态；其它组件只能通过这里的操作读写订单。

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use dental_core::utils::is_valid_order_number;
use dental_core::{
    DentalError, DentalOrder, NewDentalOrder, NewUser, OrderFilter, OrderPage, OrderStatus,
    OrderValidator, Pagination, Result, User,
};

use crate::connection::DatabasePool;
use crate::queries::DatabaseQueries;

/// 订单仓储
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 持久化新订单，分配 id 和时间戳，初始状态为 pending
    async fn create(&self, order: &NewDentalOrder, order_number: &str) -> Result<DentalOrder>;

    /// 根据ID获取订单
    async fn get_by_id(&self, id: i32) -> Result<DentalOrder>;

    /// 分页查询订单
    async fn list(&self, filter: &OrderFilter, pagination: Pagination) -> Result<OrderPage>;

    /// 更新订单状态并刷新 updated_at
    async fn update_status(&self, id: i32, status: OrderStatus) -> Result<DentalOrder>;

    /// 各状态订单数量
    async fn count_by_status(&self) -> Result<BTreeMap<OrderStatus, i64>>;
}

/// 用户仓储
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: i32) -> Result<Option<User>>;
}

/// 写入前的结构检查
pub(crate) fn check_new_order(order: &NewDentalOrder, order_number: &str) -> Result<()> {
    OrderValidator::new().check(order)?;
    if !is_valid_order_number(order_number) {
        return Err(DentalError::validation(
            "orderNumber",
            format!("Malformed order number: {}", order_number),
        ));
    }
    Ok(())
}

pub(crate) fn order_not_found(id: i32) -> DentalError {
    DentalError::NotFound(format!("Order {} not found", id))
}

/// PostgreSQL 仓储
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: DatabasePool,
}

impl PgRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// 连接数据库并确保表结构存在
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = DatabasePool::connect(url, max_connections).await?;
        DatabaseQueries::new(&pool).create_tables().await?;
        Ok(Self::new(pool))
    }

    fn queries(&self) -> DatabaseQueries<'_> {
        DatabaseQueries::new(&self.pool)
    }
}

#[async_trait]
impl OrderRepository for PgRepository {
    async fn create(&self, order: &NewDentalOrder, order_number: &str) -> Result<DentalOrder> {
        check_new_order(order, order_number)?;
        self.queries().insert_order(order, order_number, Utc::now()).await
    }

    async fn get_by_id(&self, id: i32) -> Result<DentalOrder> {
        self.queries()
            .get_order_by_id(id)
            .await?
            .ok_or_else(|| order_not_found(id))
    }

    async fn list(&self, filter: &OrderFilter, pagination: Pagination) -> Result<OrderPage> {
        let queries = self.queries();
        let orders = queries.list_orders(filter, pagination).await?;
        let total = queries.count_orders(None).await?;
        let filtered_total = queries.count_orders(Some(filter)).await?;

        Ok(OrderPage {
            orders,
            total,
            filtered_total,
        })
    }

    async fn update_status(&self, id: i32, status: OrderStatus) -> Result<DentalOrder> {
        self.queries()
            .update_order_status(id, status)
            .await?
            .ok_or_else(|| order_not_found(id))
    }

    async fn count_by_status(&self) -> Result<BTreeMap<OrderStatus, i64>> {
        self.queries().count_by_status().await
    }
}

#[async_trait]
impl UserRepository for PgRepository {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.queries().insert_user(&user).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.queries().get_user_by_username(username).await
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>> {
        self.queries().get_user_by_id(id).await
    }
}
