//! Create complaint table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Complaint::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Complaint::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Complaint::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Complaint::Description).text().not_null())
                    .col(ColumnDef::new(Complaint::Category).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Complaint::Status)
                            .string_len(16)
                            .not_null()
                            .default("Pending"),
                    )
                    .col(
                        ColumnDef::new(Complaint::Priority)
                            .string_len(16)
                            .not_null()
                            .default("Medium"),
                    )
                    .col(ColumnDef::new(Complaint::Location).string_len(512).not_null())
                    .col(ColumnDef::new(Complaint::Latitude).double())
                    .col(ColumnDef::new(Complaint::Longitude).double())
                    .col(
                        ColumnDef::new(Complaint::Images)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(ColumnDef::new(Complaint::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Complaint::AssignedTo).string_len(32))
                    .col(
                        ColumnDef::new(Complaint::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Complaint::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_user")
                            .from(Complaint::Table, Complaint::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_assigned_to")
                            .from(Complaint::Table, Complaint::AssignedTo)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: user_id + created_at (my complaints, newest first)
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_user_id_created_at")
                    .table(Complaint::Table)
                    .col(Complaint::UserId)
                    .col(Complaint::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Indexes for the authority filters
        for (name, column) in [
            ("idx_complaint_status", Complaint::Status),
            ("idx_complaint_category", Complaint::Category),
            ("idx_complaint_priority", Complaint::Priority),
            ("idx_complaint_created_at", Complaint::CreatedAt),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Complaint::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Complaint::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Complaint {
    Table,
    Id,
    Title,
    Description,
    Category,
    Status,
    Priority,
    Location,
    Latitude,
    Longitude,
    Images,
    UserId,
    AssignedTo,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
