use sea_orm::entity::prelude::*;

/// Period key of the all-time counter row.
pub const TOTAL_PERIOD: &str = "total";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "usage_counter")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub organization_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub metric: String,
    /// `YYYY-MM` for monthly rows, [`TOTAL_PERIOD`] for the running total.
    #[sea_orm(primary_key, auto_increment = false)]
    pub period: String,
    pub count: i64,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
