// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScanResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScanResults::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScanResults::Url).text().not_null())
                    .col(ColumnDef::new(ScanResults::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(ScanResults::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(ScanResults::TotalImages)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScanResults::ImagesWithAlt)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScanResults::ImagesMissingAlt)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScanResults::AltTextCoveragePercentage)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(ScanResults::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(ScanResults::ScanDurationMs)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ScanResults::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ScanResults::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_scan_results_user_id_created_at")
                    .table(ScanResults::Table)
                    .col(ScanResults::UserId)
                    .col(ScanResults::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScanResults::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ScanResults {
    Table,
    Id,
    Url,
    UserId,
    Status,
    TotalImages,
    ImagesWithAlt,
    ImagesMissingAlt,
    AltTextCoveragePercentage,
    ErrorMessage,
    ScanDurationMs,
    CreatedAt,
    UpdatedAt,
}
