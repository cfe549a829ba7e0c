// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scan_results")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub user_id: Uuid,
    pub status: String,
    pub total_images: i32,
    pub images_with_alt: i32,
    pub images_missing_alt: i32,
    pub alt_text_coverage_percentage: f64,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub scan_duration_ms: Option<i64>,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub updated_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::image_detail::Entity")]
    ImageDetail,
}

impl Related<super::image_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ImageDetail.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
