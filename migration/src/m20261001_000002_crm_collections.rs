use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Deal {
    Table,
    Id,
    OrganizationId,
    Title,
    Value,
    Stage,
    Status,
    ExpectedCloseDate,
    Probability,
    CustomerId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Activity {
    Table,
    Id,
    OrganizationId,
    Type,
    Status,
    Subject,
    DueDate,
    Notes,
    CreatedBy,
    Timestamp,
    UpdatedAt,
}

/// Customers and leads share one document shape.
const CONTACT_TABLES: [&str; 2] = ["customer", "lead"];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in CONTACT_TABLES {
            manager.create_table(contact_table(table)).await?;
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(format!("idx_{table}_organization"))
                        .table(Alias::new(table))
                        .col(Alias::new("organization_id"))
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(Deal::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Deal::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Deal::OrganizationId).uuid().not_null())
                    .col(ColumnDef::new(Deal::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Deal::Value).double())
                    .col(ColumnDef::new(Deal::Stage).string_len(64))
                    .col(ColumnDef::new(Deal::Status).string_len(64))
                    .col(ColumnDef::new(Deal::ExpectedCloseDate).date())
                    .col(ColumnDef::new(Deal::Probability).integer())
                    .col(ColumnDef::new(Deal::CustomerId).uuid())
                    .col(
                        ColumnDef::new(Deal::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deal::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deal_organization")
                    .table(Deal::Table)
                    .col(Deal::OrganizationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Activity::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Activity::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Activity::OrganizationId).uuid().not_null())
                    .col(ColumnDef::new(Activity::Type).string_len(64))
                    .col(ColumnDef::new(Activity::Status).string_len(64))
                    .col(ColumnDef::new(Activity::Subject).string_len(512).not_null())
                    .col(ColumnDef::new(Activity::DueDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Activity::Notes).text())
                    .col(ColumnDef::new(Activity::CreatedBy).uuid())
                    .col(
                        ColumnDef::new(Activity::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activity::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_activity_organization_due")
                    .table(Activity::Table)
                    .col(Activity::OrganizationId)
                    .col(Activity::DueDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Activity::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Deal::Table).if_exists().to_owned())
            .await?;
        for table in CONTACT_TABLES {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

fn contact_table(table: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(table))
        .if_not_exists()
        .col(ColumnDef::new(Alias::new("id")).uuid().not_null().primary_key())
        .col(ColumnDef::new(Alias::new("organization_id")).uuid().not_null())
        .col(ColumnDef::new(Alias::new("name")).string_len(256).not_null())
        .col(ColumnDef::new(Alias::new("email")).string_len(320).not_null())
        .col(ColumnDef::new(Alias::new("phone")).string_len(64))
        .col(ColumnDef::new(Alias::new("company")).string_len(256))
        .col(ColumnDef::new(Alias::new("status")).string_len(64))
        .col(ColumnDef::new(Alias::new("type")).string_len(64))
        .col(
            ColumnDef::new(Alias::new("created_at"))
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(Alias::new("updated_at"))
                .timestamp_with_time_zone()
                .not_null(),
        )
        .to_owned()
}
