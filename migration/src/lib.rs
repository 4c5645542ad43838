pub use sea_orm_migration::prelude::*;

mod m20261001_000001_tenancy;
mod m20261001_000002_crm_collections;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_tenancy::Migration),
            Box::new(m20261001_000002_crm_collections::Migration),
        ]
    }
}
