// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::image_detail::ImageDetail;
use crate::domain::models::scan_result::{ScanResult, ScanStatus};
use crate::domain::repositories::scan_result_repository::{
    page_size, ImageQuery, RepositoryError, ScanQuery, ScanResultRepository,
};
use crate::infrastructure::database::entities::{
    image_detail as image_entity, scan_result as scan_entity,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait, Set, TransactionTrait,
    UpdateMany,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 单条 INSERT 语句写入的图片明细数量
const INSERT_BATCH_SIZE: usize = 200;

/// 扫描结果仓库实现
///
/// 基于SeaORM实现的扫描结果数据访问层
#[derive(Clone)]
pub struct ScanResultRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ScanResultRepositoryImpl {
    /// 创建新的扫描结果仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的扫描结果仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or_default()
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl From<scan_entity::Model> for ScanResult {
    fn from(model: scan_entity::Model) -> Self {
        Self {
            id: model.id,
            url: model.url,
            user_id: model.user_id,
            status: model.status.parse().unwrap_or_default(),
            total_images: to_u32(model.total_images),
            images_with_alt: to_u32(model.images_with_alt),
            images_missing_alt: to_u32(model.images_missing_alt),
            alt_text_coverage_percentage: model.alt_text_coverage_percentage,
            error_message: model.error_message,
            scan_duration_ms: model
                .scan_duration_ms
                .map(|ms| u64::try_from(ms).unwrap_or_default()),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<&ScanResult> for scan_entity::ActiveModel {
    fn from(scan: &ScanResult) -> Self {
        Self {
            id: Set(scan.id),
            url: Set(scan.url.clone()),
            user_id: Set(scan.user_id),
            status: Set(scan.status.to_string()),
            total_images: Set(to_i32(scan.total_images)),
            images_with_alt: Set(to_i32(scan.images_with_alt)),
            images_missing_alt: Set(to_i32(scan.images_missing_alt)),
            alt_text_coverage_percentage: Set(scan.alt_text_coverage_percentage),
            error_message: Set(scan.error_message.clone()),
            scan_duration_ms: Set(scan.scan_duration_ms.map(duration_to_i64)),
            created_at: Set(scan.created_at),
            updated_at: Set(scan.updated_at),
        }
    }
}

impl From<image_entity::Model> for ImageDetail {
    fn from(model: image_entity::Model) -> Self {
        Self {
            id: model.id,
            scan_result_id: model.scan_result_id,
            position: to_u32(model.position),
            image_url: model.image_url,
            alt_text: model.alt_text,
            has_alt_text: model.has_alt_text,
            is_decorative: model.is_decorative,
            alt_text_length: model.alt_text_length.map(to_u32),
            image_width: model.image_width.map(to_u32),
            image_height: model.image_height.map(to_u32),
            created_at: model.created_at,
        }
    }
}

impl From<&ImageDetail> for image_entity::ActiveModel {
    fn from(image: &ImageDetail) -> Self {
        Self {
            id: Set(image.id),
            scan_result_id: Set(image.scan_result_id),
            position: Set(to_i32(image.position)),
            image_url: Set(image.image_url.clone()),
            alt_text: Set(image.alt_text.clone()),
            has_alt_text: Set(image.has_alt_text),
            is_decorative: Set(image.is_decorative),
            alt_text_length: Set(image.alt_text_length.map(to_i32)),
            image_width: Set(image.image_width.map(to_i32)),
            image_height: Set(image.image_height.map(to_i32)),
            created_at: Set(image.created_at),
        }
    }
}

fn duration_to_i64(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// 构建条件更新语句：仅当记录仍处于 `expected` 状态时写入
fn conditional_update(scan: &ScanResult, expected: ScanStatus) -> UpdateMany<scan_entity::Entity> {
    scan_entity::Entity::update_many()
        .col_expr(scan_entity::Column::Status, Expr::value(scan.status.to_string()))
        .col_expr(
            scan_entity::Column::TotalImages,
            Expr::value(to_i32(scan.total_images)),
        )
        .col_expr(
            scan_entity::Column::ImagesWithAlt,
            Expr::value(to_i32(scan.images_with_alt)),
        )
        .col_expr(
            scan_entity::Column::ImagesMissingAlt,
            Expr::value(to_i32(scan.images_missing_alt)),
        )
        .col_expr(
            scan_entity::Column::AltTextCoveragePercentage,
            Expr::value(scan.alt_text_coverage_percentage),
        )
        .col_expr(
            scan_entity::Column::ErrorMessage,
            Expr::value(scan.error_message.clone()),
        )
        .col_expr(
            scan_entity::Column::ScanDurationMs,
            Expr::value(scan.scan_duration_ms.map(duration_to_i64)),
        )
        .col_expr(scan_entity::Column::UpdatedAt, Expr::value(scan.updated_at))
        .filter(scan_entity::Column::Id.eq(scan.id))
        .filter(scan_entity::Column::Status.eq(expected.to_string()))
}

#[async_trait]
impl ScanResultRepository for ScanResultRepositoryImpl {
    async fn create(&self, scan: &ScanResult) -> Result<ScanResult, RepositoryError> {
        let model: scan_entity::ActiveModel = scan.into();
        let inserted = model.insert(self.db.as_ref()).await?;
        Ok(inserted.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScanResult>, RepositoryError> {
        let model = scan_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn save_scan_result(
        &self,
        scan: &ScanResult,
        expected: ScanStatus,
    ) -> Result<bool, RepositoryError> {
        let result = conditional_update(scan, expected)
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            debug!(scan_id = %scan.id, %expected, "Conditional update matched no row");
        }
        Ok(result.rows_affected > 0)
    }

    async fn replace_image_details(
        &self,
        scan: &ScanResult,
        expected: ScanStatus,
        images: &[ImageDetail],
    ) -> Result<bool, RepositoryError> {
        let txn = self.db.begin().await?;

        let result = conditional_update(scan, expected).exec(&txn).await?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            debug!(scan_id = %scan.id, %expected, "Conditional update matched no row");
            return Ok(false);
        }

        image_entity::Entity::delete_many()
            .filter(image_entity::Column::ScanResultId.eq(scan.id))
            .exec(&txn)
            .await?;

        for batch in images.chunks(INSERT_BATCH_SIZE) {
            image_entity::Entity::insert_many(batch.iter().map(image_entity::ActiveModel::from))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(true)
    }

    async fn list_images(
        &self,
        scan_id: Uuid,
        query: &ImageQuery,
    ) -> Result<Vec<ImageDetail>, RepositoryError> {
        let models = image_entity::Entity::find()
            .filter(image_entity::Column::ScanResultId.eq(scan_id))
            .apply_if(query.has_alt_text, |q, v| {
                q.filter(image_entity::Column::HasAltText.eq(v))
            })
            .apply_if(query.is_decorative, |q, v| {
                q.filter(image_entity::Column::IsDecorative.eq(v))
            })
            .order_by_asc(image_entity::Column::Position)
            .offset(query.offset)
            .limit(page_size(query.limit))
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        query: &ScanQuery,
    ) -> Result<Vec<ScanResult>, RepositoryError> {
        let models = scan_entity::Entity::find()
            .filter(scan_entity::Column::UserId.eq(user_id))
            .apply_if(query.status, |q, status| {
                q.filter(scan_entity::Column::Status.eq(status.to_string()))
            })
            .apply_if(query.created_after, |q, after| {
                q.filter(scan_entity::Column::CreatedAt.gte(after))
            })
            .apply_if(query.created_before, |q, before| {
                q.filter(scan_entity::Column::CreatedAt.lt(before))
            })
            .order_by_desc(scan_entity::Column::CreatedAt)
            .order_by_desc(scan_entity::Column::Id)
            .offset(query.offset)
            .limit(page_size(query.limit))
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn count_created_since(
        &self,
        user_id: Uuid,
        since: DateTime<FixedOffset>,
    ) -> Result<u64, RepositoryError> {
        let count = scan_entity::Entity::find()
            .filter(scan_entity::Column::UserId.eq(user_id))
            .filter(scan_entity::Column::CreatedAt.gte(since))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let txn = self.db.begin().await?;

        image_entity::Entity::delete_many()
            .filter(image_entity::Column::ScanResultId.eq(id))
            .exec(&txn)
            .await?;
        let result = scan_entity::Entity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        Ok(result.rows_affected > 0)
    }
}
