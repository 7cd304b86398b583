use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Members of this group may read and edit every course and lesson.
pub const MODERATOR_GROUP: &str = "moderator";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let insert = sea_orm_migration::sea_query::Query::insert()
            .into_table(Groups)
            .columns([crate::entities::groups::Column::Name])
            .values_panic([MODERATOR_GROUP.into()])
            .on_conflict(
                OnConflict::column(crate::entities::groups::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .to_owned();

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let delete = sea_orm_migration::sea_query::Query::delete()
            .from_table(Groups)
            .and_where(Expr::col(crate::entities::groups::Column::Name).eq(MODERATOR_GROUP))
            .to_owned();

        manager.exec_stmt(delete).await?;

        Ok(())
    }
}
