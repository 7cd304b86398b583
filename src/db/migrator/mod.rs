use sea_orm_migration::prelude::*;

mod m20260301_initial_schema;
pub mod m20260302_seed_moderator_group;
mod m20260305_unique_subscriptions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_initial_schema::Migration),
            Box::new(m20260302_seed_moderator_group::Migration),
            Box::new(m20260305_unique_subscriptions::Migration),
        ]
    }
}
