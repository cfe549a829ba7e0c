// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

use crate::m20260301_000001_create_scan_results::ScanResults;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ImageDetails::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ImageDetails::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ImageDetails::ScanResultId).uuid().not_null())
                    .col(ColumnDef::new(ImageDetails::Position).integer().not_null())
                    .col(ColumnDef::new(ImageDetails::ImageUrl).text().not_null())
                    .col(ColumnDef::new(ImageDetails::AltText).text().null())
                    .col(
                        ColumnDef::new(ImageDetails::HasAltText)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ImageDetails::IsDecorative)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ImageDetails::AltTextLength).integer().null())
                    .col(ColumnDef::new(ImageDetails::ImageWidth).integer().null())
                    .col(ColumnDef::new(ImageDetails::ImageHeight).integer().null())
                    .col(
                        ColumnDef::new(ImageDetails::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_image_details_scan_result_id")
                            .from(ImageDetails::Table, ImageDetails::ScanResultId)
                            .to(ScanResults::Table, ScanResults::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_image_details_scan_result_id_position")
                    .table(ImageDetails::Table)
                    .col(ImageDetails::ScanResultId)
                    .col(ImageDetails::Position)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ImageDetails::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ImageDetails {
    Table,
    Id,
    ScanResultId,
    Position,
    ImageUrl,
    AltText,
    HasAltText,
    IsDecorative,
    AltTextLength,
    ImageWidth,
    ImageHeight,
    CreatedAt,
}
