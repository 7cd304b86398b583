use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();

        conn.execute_unprepared(
            "DELETE FROM subscriptions WHERE rowid NOT IN (SELECT MIN(rowid) FROM subscriptions GROUP BY user_id, course_id)",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_subscriptions_user_course_unique ON subscriptions(user_id, course_id)",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_payments_user_idempotency_unique ON payments(user_id, idempotency_key) WHERE idempotency_key IS NOT NULL",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();

        conn.execute_unprepared("DROP INDEX IF EXISTS idx_payments_user_idempotency_unique")
            .await?;

        conn.execute_unprepared("DROP INDEX IF EXISTS idx_subscriptions_user_course_unique")
            .await?;

        Ok(())
    }
}
