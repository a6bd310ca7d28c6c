//! 数据库查询操作

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dental_core::{
    DentalError, DentalOrder, NewDentalOrder, NewUser, OrderFilter, OrderStatus, Pagination,
    Result, User,
};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

use crate::connection::DatabasePool;
use crate::models::*;

const UNIQUE_VIOLATION: &str = "23505";

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建用户表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id SERIAL PRIMARY KEY,
                username VARCHAR(100) UNIQUE NOT NULL,
                password VARCHAR(255) NOT NULL,
                email VARCHAR(255),
                full_name VARCHAR(255),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        // 创建订单表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dental_orders (
                id SERIAL PRIMARY KEY,
                order_number VARCHAR(50) UNIQUE NOT NULL,
                patient_name VARCHAR(255) NOT NULL,
                patient_id VARCHAR(100),
                selected_teeth JSONB NOT NULL,
                tooth_configurations JSONB NOT NULL,
                observations TEXT,
                smile_photo_path VARCHAR(500),
                scanner_file_path VARCHAR(500),
                status VARCHAR(50) NOT NULL DEFAULT 'pending',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_dental_orders_status ON dental_orders(status)",
            "CREATE INDEX IF NOT EXISTS idx_dental_orders_created_at ON dental_orders(created_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_dental_orders_patient_name ON dental_orders(patient_name)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }

    // ========== 订单相关操作 ==========

    /// 插入新订单，订单号冲突时返回 DuplicateOrderNumber
    pub async fn insert_order(
        &self,
        order: &NewDentalOrder,
        order_number: &str,
        now: DateTime<Utc>,
    ) -> Result<DentalOrder> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbDentalOrder>(
            r#"
            INSERT INTO dental_orders (
                order_number, patient_name, patient_id, selected_teeth, tooth_configurations,
                observations, smile_photo_path, scanner_file_path, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
        "#,
        )
        .bind(order_number)
        .bind(&order.patient_name)
        .bind(&order.patient_id)
        .bind(Json(&order.selected_teeth))
        .bind(Json(&order.tooth_configurations))
        .bind(&order.observations)
        .bind(&order.smile_photo_path)
        .bind(&order.scanner_file_path)
        .bind(OrderStatus::Pending.as_str())
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| map_unique_violation(e, || DentalError::DuplicateOrderNumber(order_number.to_string())))?;

        DentalOrder::try_from(row)
    }

    /// 根据ID查找订单
    pub async fn get_order_by_id(&self, id: i32) -> Result<Option<DentalOrder>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbDentalOrder>("SELECT * FROM dental_orders WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        row.map(DentalOrder::try_from).transpose()
    }

    /// 按条件分页查询，按创建时间倒序
    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Vec<DentalOrder>> {
        let pool = self.pool.pool();

        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM dental_orders");
        push_filters(&mut builder, filter);
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(pagination.limit)
            .push(" OFFSET ")
            .push_bind(pagination.offset);

        let rows = builder
            .build_query_as::<DbDentalOrder>()
            .fetch_all(pool)
            .await?;

        rows.into_iter().map(DentalOrder::try_from).collect()
    }

    /// 订单数量；传入过滤条件时统计过滤后的数量
    pub async fn count_orders(&self, filter: Option<&OrderFilter>) -> Result<i64> {
        let pool = self.pool.pool();

        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM dental_orders");
        if let Some(filter) = filter {
            push_filters(&mut builder, filter);
        }

        let count: i64 = builder.build_query_scalar().fetch_one(pool).await?;
        Ok(count)
    }

    /// 更新订单状态，updated_at 不会倒退
    pub async fn update_order_status(
        &self,
        id: i32,
        status: OrderStatus,
    ) -> Result<Option<DentalOrder>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbDentalOrder>(
            r#"
            UPDATE dental_orders
            SET status = $1, updated_at = GREATEST(NOW(), updated_at)
            WHERE id = $2
            RETURNING *
        "#,
        )
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.map(DentalOrder::try_from).transpose()
    }

    /// 各状态订单数量
    pub async fn count_by_status(&self) -> Result<BTreeMap<OrderStatus, i64>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbStatusCount>(
            "SELECT status, COUNT(*) AS count FROM dental_orders GROUP BY status",
        )
        .fetch_all(pool)
        .await?;

        let mut counts: BTreeMap<OrderStatus, i64> =
            OrderStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for row in rows {
            let status = parse_stored_status(&row.status)?;
            counts.insert(status, row.count);
        }
        Ok(counts)
    }

    // ========== 用户相关操作 ==========

    /// 创建用户，用户名重复时返回验证错误
    pub async fn insert_user(&self, user: &NewUser) -> Result<User> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbUser>(
            r#"
            INSERT INTO users (username, password, email, full_name)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.full_name)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                DentalError::validation("username", "Username already exists")
            })
        })?;

        Ok(User::from(row))
    }

    /// 根据用户名查找用户
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(User::from))
    }

    /// 根据ID查找用户
    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(User::from))
    }
}

/// 追加 WHERE 子句：状态精确匹配，文本对订单号、姓名、患者ID做不区分大小写的子串匹配
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    let mut has_where = false;

    if let Some(status) = filter.status {
        builder.push(" WHERE status = ").push_bind(status.as_str());
        has_where = true;
    }

    if let Some(text) = filter.search_text.as_deref().map(str::trim) {
        if !text.is_empty() {
            let pattern = like_pattern(text);
            builder
                .push(if has_where { " AND " } else { " WHERE " })
                .push("(order_number ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR patient_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR patient_id ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

/// 转义 LIKE 通配符后包装为子串匹配模式
pub fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn map_unique_violation(err: sqlx::Error, on_conflict: impl FnOnce() -> DentalError) -> DentalError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return on_conflict();
        }
    }
    tracing::error!("Database error: {}", err);
    DentalError::from(err)
}
