use std::collections::HashMap;

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::{entities::pod, models::image::Image};

#[derive(Debug, Error)]
pub enum PodError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Pod not found")]
    PodNotFound,
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Pod {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub pod_type: String,
    pub planting_date: NaiveDate,
    pub description: Option<String>,
}

/// A pod as returned over the API, with its images nested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct PodWithImages {
    #[serde(flatten)]
    pub pod: Pod,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone)]
pub struct CreatePod {
    pub name: String,
    pub pod_type: String,
    pub planting_date: NaiveDate,
    pub description: Option<String>,
}

/// Partial update. Absent fields are left untouched. `description: null`
/// clears the description, while a `null` for the required fields is treated
/// the same as leaving them out.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdatePod {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub pod_type: Option<String>,
    #[serde(default)]
    pub planting_date: Option<NaiveDate>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(as = "Option<String>", optional)]
    pub description: Option<Option<String>>,
}

fn require_text(field: &str, value: &str) -> Result<(), PodError> {
    if value.trim().is_empty() {
        return Err(PodError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

impl CreatePod {
    pub fn validate(&self) -> Result<(), PodError> {
        require_text("name", &self.name)?;
        require_text("type", &self.pod_type)
    }
}

impl UpdatePod {
    pub fn validate(&self) -> Result<(), PodError> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(pod_type) = &self.pod_type {
            require_text("type", pod_type)?;
        }
        Ok(())
    }
}

impl Pod {
    fn from_model(model: pod::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            pod_type: model.pod_type,
            planting_date: model.planting_date,
            description: model.description,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = pod::Entity::find()
            .order_by_asc(pod::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_all_with_images<C: ConnectionTrait>(
        db: &C,
    ) -> Result<Vec<PodWithImages>, DbErr> {
        let pods = Self::find_all(db).await?;

        let mut images_by_pod: HashMap<i64, Vec<Image>> = HashMap::new();
        for image in Image::find_all(db).await? {
            images_by_pod.entry(image.pod_id).or_default().push(image);
        }

        Ok(pods
            .into_iter()
            .map(|pod| {
                let images = images_by_pod.remove(&pod.id).unwrap_or_default();
                PodWithImages { pod, images }
            })
            .collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = pod::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_id_with_images<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<PodWithImages>, DbErr> {
        let Some(pod) = Self::find_by_id(db, id).await? else {
            return Ok(None);
        };
        let images = Image::find_by_pod_id(db, id).await?;
        Ok(Some(PodWithImages { pod, images }))
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreatePod) -> Result<Self, DbErr> {
        let active = pod::ActiveModel {
            name: Set(data.name.clone()),
            pod_type: Set(data.pod_type.clone()),
            planting_date: Set(data.planting_date),
            description: Set(data.description.clone()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    /// Returns `None` when no pod has this id.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &UpdatePod,
    ) -> Result<Option<Self>, DbErr> {
        let Some(record) = pod::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };

        let mut active: pod::ActiveModel = record.clone().into();
        if let Some(name) = data.name.clone() {
            active.name = Set(name);
        }
        if let Some(pod_type) = data.pod_type.clone() {
            active.pod_type = Set(pod_type);
        }
        if let Some(planting_date) = data.planting_date {
            active.planting_date = Set(planting_date);
        }
        if let Some(description) = data.description.clone() {
            active.description = Set(description);
        }

        if !active.is_changed() {
            return Ok(Some(Self::from_model(record)));
        }
        let updated = active.update(db).await?;
        Ok(Some(Self::from_model(updated)))
    }

    /// Deletes the pod's image rows and then the pod row in one transaction.
    /// Stored image files are left in place.
    pub async fn delete(pool: &DatabaseConnection, id: i64) -> Result<u64, DbErr> {
        let tx = pool.begin().await?;
        let images_removed = Image::delete_by_pod_id(&tx, id).await?;
        let result = pod::Entity::delete_by_id(id).exec(&tx).await?;
        tx.commit().await?;

        if result.rows_affected > 0 {
            tracing::debug!(pod_id = id, images_removed, "Deleted pod");
        }
        Ok(result.rows_affected)
    }
}
