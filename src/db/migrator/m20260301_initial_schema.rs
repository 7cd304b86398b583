use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{EntityTrait, Schema};

#[derive(DeriveMigrationName)]
pub struct Migration;

async fn create_from_entity<E: EntityTrait>(
    manager: &SchemaManager<'_>,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    manager
        .create_table(
            schema
                .create_table_from_entity(entity)
                .if_not_exists()
                .to_owned(),
        )
        .await
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        // Referenced tables first so foreign keys resolve
        create_from_entity(manager, &schema, Users).await?;
        create_from_entity(manager, &schema, Groups).await?;
        create_from_entity(manager, &schema, UserGroups).await?;
        create_from_entity(manager, &schema, Courses).await?;
        create_from_entity(manager, &schema, Lessons).await?;
        create_from_entity(manager, &schema, Subscriptions).await?;
        create_from_entity(manager, &schema, Payments).await?;

        let conn = manager.get_connection();
        conn.execute_unprepared("CREATE INDEX IF NOT EXISTS idx_courses_owner ON courses(owner_id)")
            .await?;
        conn.execute_unprepared("CREATE INDEX IF NOT EXISTS idx_lessons_course ON lessons(course_id)")
            .await?;
        conn.execute_unprepared("CREATE INDEX IF NOT EXISTS idx_lessons_owner ON lessons(owner_id)")
            .await?;
        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_payments_user_date ON payments(user_id, payment_date)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Subscriptions).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Lessons).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Courses).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserGroups).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).if_exists().to_owned())
            .await?;

        Ok(())
    }
}
