use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::Expr,
};

use crate::domain::{PaymentMethod, Visibility};
use crate::entities::{payments, prelude::*};

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: i32,
    pub course_id: Option<i32>,
    pub lesson_id: Option<i32>,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentOrdering {
    DateAsc,
    #[default]
    DateDesc,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub course_id: Option<i32>,
    pub lesson_id: Option<i32>,
    pub payment_method: Option<PaymentMethod>,
    pub ordering: PaymentOrdering,
}

pub struct PaymentRepository {
    conn: DatabaseConnection,
}

impl PaymentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, payment: NewPayment) -> Result<payments::Model> {
        let model = payments::ActiveModel {
            user_id: Set(Some(payment.user_id)),
            payment_date: Set(Utc::now()),
            course_id: Set(payment.course_id),
            lesson_id: Set(payment.lesson_id),
            amount: Set(payment.amount),
            payment_method: Set(payment.payment_method.as_str().to_string()),
            session_id: Set(None),
            link: Set(None),
            idempotency_key: Set(payment.idempotency_key),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert payment")?;

        Ok(model)
    }

    pub async fn get(&self, id: i32) -> Result<Option<payments::Model>> {
        Payments::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query payment")
    }

    pub async fn find_by_idempotency_key(
        &self,
        user_id: i32,
        key: &str,
    ) -> Result<Option<payments::Model>> {
        Payments::find()
            .filter(payments::Column::UserId.eq(user_id))
            .filter(payments::Column::IdempotencyKey.eq(key))
            .one(&self.conn)
            .await
            .context("Failed to query payment by idempotency key")
    }

    pub async fn attach_session(
        &self,
        id: i32,
        session_id: &str,
        link: &str,
    ) -> Result<Option<payments::Model>> {
        Payments::update_many()
            .col_expr(payments::Column::SessionId, Expr::value(session_id))
            .col_expr(payments::Column::Link, Expr::value(link))
            .filter(payments::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to store checkout session")?;

        self.get(id).await
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Payments::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn list(
        &self,
        visibility: Visibility,
        filter: &PaymentFilter,
    ) -> Result<Vec<payments::Model>> {
        let mut query = Payments::find();

        match visibility {
            Visibility::All => {}
            Visibility::OwnedBy(user_id) => {
                query = query.filter(payments::Column::UserId.eq(user_id));
            }
            Visibility::Nothing => return Ok(Vec::new()),
        }

        if let Some(course_id) = filter.course_id {
            query = query.filter(payments::Column::CourseId.eq(course_id));
        }

        if let Some(lesson_id) = filter.lesson_id {
            query = query.filter(payments::Column::LessonId.eq(lesson_id));
        }

        if let Some(method) = filter.payment_method {
            query = query.filter(payments::Column::PaymentMethod.eq(method.as_str()));
        }

        query = match filter.ordering {
            PaymentOrdering::DateAsc => query
                .order_by_asc(payments::Column::PaymentDate)
                .order_by_asc(payments::Column::Id),
            PaymentOrdering::DateDesc => query
                .order_by_desc(payments::Column::PaymentDate)
                .order_by_desc(payments::Column::Id),
        };

        let items = query.all(&self.conn).await?;
        Ok(items)
    }

    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<payments::Model>> {
        let items = Payments::find()
            .filter(payments::Column::UserId.eq(user_id))
            .order_by_desc(payments::Column::PaymentDate)
            .all(&self.conn)
            .await?;
        Ok(items)
    }
}
