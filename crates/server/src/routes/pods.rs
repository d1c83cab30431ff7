use axum::{
    Extension, Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use chrono::NaiveDate;
use db::models::{
    image::{CreateImage, Image},
    pod::{CreatePod, Pod, PodError, PodWithImages, UpdatePod},
};
use services::services::image::{ImageService, StagedUpload};

use crate::{AppContext, error::ApiError, middleware::load_pod_middleware, routes::images};

const PLANTING_DATE_FORMAT: &str = "%Y-%m-%d";

/// Fields of the create-pod multipart form as they arrive, before parsing.
#[derive(Debug, Default)]
struct PodForm {
    name: Option<String>,
    pod_type: Option<String>,
    planting_date: Option<String>,
    description: Option<String>,
    image: Option<StagedUpload>,
}

impl PodForm {
    fn into_create_pod(self) -> Result<CreatePod, ApiError> {
        let name = self.name.ok_or_else(|| missing_field("name"))?;
        let pod_type = self.pod_type.ok_or_else(|| missing_field("type"))?;
        let raw_date = self
            .planting_date
            .ok_or_else(|| missing_field("planting_date"))?;
        let planting_date = parse_planting_date(&raw_date)?;

        let data = CreatePod {
            name,
            pod_type,
            planting_date,
            description: self.description.filter(|d| !d.is_empty()),
        };
        data.validate()?;
        Ok(data)
    }
}

pub(crate) fn missing_field(name: &str) -> ApiError {
    ApiError::Validation(format!("Missing form field: {name}"))
}

fn parse_planting_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), PLANTING_DATE_FORMAT).map_err(|_| {
        ApiError::BadRequest(format!(
            "Invalid planting_date '{raw}': expected YYYY-MM-DD"
        ))
    })
}

async fn fill_pod_form(
    images: &ImageService,
    multipart: &mut Multipart,
    form: &mut PodForm,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("name") => form.name = Some(field.text().await?),
            Some("type") => form.pod_type = Some(field.text().await?),
            Some("planting_date") => form.planting_date = Some(field.text().await?),
            Some("description") => form.description = Some(field.text().await?),
            Some("image") if form.image.is_none() => {
                // Browsers send an empty file part when nothing was picked.
                let file_name = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned);
                if file_name.is_some() {
                    form.image = Some(images.stage_stream(file_name.as_deref(), field).await?);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Reads the whole form. An image part is staged on disk because it may
/// arrive before the fields needed to create the pod.
async fn read_pod_form(
    images: &ImageService,
    mut multipart: Multipart,
) -> Result<PodForm, ApiError> {
    let mut form = PodForm::default();
    if let Err(err) = fill_pod_form(images, &mut multipart, &mut form).await {
        if let Some(staged) = form.image.take() {
            images.discard(staged).await;
        }
        return Err(err);
    }
    Ok(form)
}

pub async fn get_pods(
    State(context): State<AppContext>,
) -> Result<ResponseJson<Vec<PodWithImages>>, ApiError> {
    let pods = Pod::find_all_with_images(&context.db().pool).await?;
    Ok(ResponseJson(pods))
}

pub async fn create_pod(
    State(context): State<AppContext>,
    multipart: Multipart,
) -> Result<ResponseJson<PodWithImages>, ApiError> {
    let pool = &context.db().pool;
    let images = context.images();

    let mut form = read_pod_form(images, multipart).await?;
    let staged = form.image.take();

    let created = match form.into_create_pod() {
        Ok(data) => Pod::create(pool, &data).await.map_err(ApiError::from),
        Err(err) => Err(err),
    };
    let pod = match created {
        Ok(pod) => pod,
        Err(err) => {
            if let Some(staged) = staged {
                images.discard(staged).await;
            }
            return Err(err);
        }
    };
    tracing::info!(pod_id = pod.id, name = %pod.name, "Created pod");

    // The pod row is already committed; a failure here leaves it without an image.
    if let Some(staged) = staged {
        let filename = images.claim(staged, pod.id).await?;
        let attached = Image::create(
            pool,
            &CreateImage {
                pod_id: pod.id,
                filename: filename.clone(),
                description: None,
            },
        )
        .await;
        if let Err(err) = attached {
            images.remove(&filename).await;
            return Err(err.into());
        }
    }

    let pod = Pod::find_by_id_with_images(pool, pod.id)
        .await?
        .ok_or(PodError::PodNotFound)?;
    Ok(ResponseJson(pod))
}

pub async fn update_pod(
    Extension(existing): Extension<Pod>,
    State(context): State<AppContext>,
    Json(payload): Json<UpdatePod>,
) -> Result<ResponseJson<PodWithImages>, ApiError> {
    payload.validate()?;

    let pool = &context.db().pool;
    Pod::update(pool, existing.id, &payload)
        .await?
        .ok_or(PodError::PodNotFound)?;
    let pod = Pod::find_by_id_with_images(pool, existing.id)
        .await?
        .ok_or(PodError::PodNotFound)?;
    Ok(ResponseJson(pod))
}

pub async fn delete_pod(
    Extension(pod): Extension<Pod>,
    State(context): State<AppContext>,
) -> Result<StatusCode, ApiError> {
    let rows_affected = Pod::delete(&context.db().pool, pod.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("Pod not found".to_string()));
    }
    tracing::info!(pod_id = pod.id, "Deleted pod");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(context: &AppContext) -> Router<AppContext> {
    let pod_router = Router::new()
        .route("/", put(update_pod).delete(delete_pod))
        .route("/images", post(images::add_image))
        .layer(from_fn_with_state(
            context.clone(),
            load_pod_middleware::<AppContext>,
        ));

    let inner = Router::new()
        .route("/", get(get_pods).post(create_pod))
        .nest("/{pod_id}", pod_router);

    Router::new().nest("/pods", inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: Option<&str>, pod_type: Option<&str>, date: Option<&str>) -> PodForm {
        PodForm {
            name: name.map(str::to_owned),
            pod_type: pod_type.map(str::to_owned),
            planting_date: date.map(str::to_owned),
            description: Some(String::new()),
            image: None,
        }
    }

    #[test]
    fn complete_form_becomes_create_pod() {
        let data = form(Some("Tomato A"), Some("vegetable"), Some("2024-03-01"))
            .into_create_pod()
            .unwrap();
        assert_eq!(data.name, "Tomato A");
        assert_eq!(data.planting_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(data.description, None);
    }

    #[test]
    fn missing_fields_are_validation_errors() {
        let err = form(None, Some("vegetable"), Some("2024-03-01"))
            .into_create_pod()
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("name")));

        let err = form(Some("Tomato A"), Some("vegetable"), None)
            .into_create_pod()
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("planting_date")));
    }

    #[test]
    fn malformed_dates_are_bad_requests() {
        for raw in ["03/01/2024", "2024-13-01", "2024-02-30", "yesterday"] {
            let err = form(Some("Tomato A"), Some("vegetable"), Some(raw))
                .into_create_pod()
                .unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)), "{raw} should be rejected");
        }
    }

    #[test]
    fn blank_type_is_rejected() {
        let err = form(Some("Tomato A"), Some(" "), Some("2024-03-01"))
            .into_create_pod()
            .unwrap_err();
        assert!(matches!(err, ApiError::Pod(PodError::Validation(_))));
    }
}
