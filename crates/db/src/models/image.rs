use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::entities::image;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Image {
    pub id: i64,
    pub pod_id: i64,
    pub filename: String,
    #[ts(type = "string")]
    pub upload_time: DateTime<Utc>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateImage {
    pub pod_id: i64,
    pub filename: String,
    pub description: Option<String>,
}

impl Image {
    pub(crate) fn from_model(model: image::Model) -> Self {
        Self {
            id: model.id,
            pod_id: model.pod_id,
            filename: model.filename,
            upload_time: model.upload_time,
            description: model.description,
        }
    }

    /// Insert an image row for `data.pod_id`. The pod is not looked up here;
    /// the foreign key rejects rows for pods that do not exist.
    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateImage) -> Result<Self, DbErr> {
        let active = image::ActiveModel {
            pod_id: Set(data.pod_id),
            filename: Set(data.filename.clone()),
            upload_time: Set(Utc::now()),
            description: Set(data.description.clone()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn find_by_pod_id<C: ConnectionTrait>(
        db: &C,
        pod_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = image::Entity::find()
            .filter(image::Column::PodId.eq(pod_id))
            .order_by_asc(image::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_filename<C: ConnectionTrait>(
        db: &C,
        filename: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = image::Entity::find()
            .filter(image::Column::Filename.eq(filename))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub(crate) async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = image::Entity::find()
            .order_by_asc(image::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub(crate) async fn delete_by_pod_id<C: ConnectionTrait>(
        db: &C,
        pod_id: i64,
    ) -> Result<u64, DbErr> {
        let result = image::Entity::delete_many()
            .filter(image::Column::PodId.eq(pod_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
