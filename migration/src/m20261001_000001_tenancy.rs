use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum AppUser {
    Table,
    Id,
    Email,
    DisplayName,
    PasswordHash,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Organization {
    Table,
    Id,
    Name,
    Settings,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Membership {
    Table,
    OrganizationId,
    UserId,
    Email,
    Role,
    JoinedAt,
}

#[derive(DeriveIden)]
enum Subscription {
    Table,
    OrganizationId,
    Plan,
    Status,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UsageCounter {
    Table,
    OrganizationId,
    Metric,
    Period,
    Count,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AppUser::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AppUser::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(AppUser::Email)
                            .string_len(320)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(AppUser::DisplayName).string_len(100))
                    .col(ColumnDef::new(AppUser::PasswordHash).text().not_null())
                    .col(
                        ColumnDef::new(AppUser::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Organization::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Organization::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Organization::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Organization::Settings).json().not_null())
                    .col(
                        ColumnDef::new(Organization::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Organization::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Membership::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Membership::OrganizationId).uuid().not_null())
                    .col(ColumnDef::new(Membership::UserId).uuid().not_null())
                    .col(ColumnDef::new(Membership::Email).string_len(320).not_null())
                    .col(ColumnDef::new(Membership::Role).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Membership::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(Membership::OrganizationId)
                            .col(Membership::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_membership_organization")
                            .from(Membership::Table, Membership::OrganizationId)
                            .to(Organization::Table, Organization::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_membership_user")
                            .from(Membership::Table, Membership::UserId)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_membership_user")
                    .table(Membership::Table)
                    .col(Membership::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Subscription::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Subscription::OrganizationId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Subscription::Plan).string_len(16).not_null())
                    .col(ColumnDef::new(Subscription::Status).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Subscription::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_organization")
                            .from(Subscription::Table, Subscription::OrganizationId)
                            .to(Organization::Table, Organization::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UsageCounter::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UsageCounter::OrganizationId).uuid().not_null())
                    .col(ColumnDef::new(UsageCounter::Metric).string_len(32).not_null())
                    .col(ColumnDef::new(UsageCounter::Period).string_len(16).not_null())
                    .col(
                        ColumnDef::new(UsageCounter::Count)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UsageCounter::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(UsageCounter::OrganizationId)
                            .col(UsageCounter::Metric)
                            .col(UsageCounter::Period),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsageCounter::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Subscription::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Membership::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Organization::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AppUser::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
