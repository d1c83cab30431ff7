use axum::{
    Extension, Router,
    body::Body,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::get,
};
use db::models::{
    image::{CreateImage, Image},
    pod::Pod,
};
use services::services::image::ImageService;
use tokio_util::io::ReaderStream;

use crate::{AppContext, error::ApiError, routes::pods::missing_field};

#[derive(Debug, Default)]
struct ImageForm {
    filename: Option<String>,
    description: Option<String>,
}

async fn fill_image_form(
    images: &ImageService,
    pod_id: i64,
    multipart: &mut Multipart,
    form: &mut ImageForm,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("description") => form.description = Some(field.text().await?),
            Some("image") if form.filename.is_none() => {
                // An empty file part means nothing was picked.
                let Some(original_name) = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned)
                else {
                    continue;
                };
                form.filename = Some(
                    images
                        .store_stream(pod_id, Some(&original_name), field)
                        .await?,
                );
            }
            _ => {}
        }
    }
    Ok(())
}

pub async fn add_image(
    Extension(pod): Extension<Pod>,
    State(context): State<AppContext>,
    mut multipart: Multipart,
) -> Result<ResponseJson<Image>, ApiError> {
    let images = context.images();

    let mut form = ImageForm::default();
    if let Err(err) = fill_image_form(images, pod.id, &mut multipart, &mut form).await {
        if let Some(filename) = form.filename.take() {
            images.remove(&filename).await;
        }
        return Err(err);
    }
    let filename = form.filename.ok_or_else(|| missing_field("image"))?;

    let created = Image::create(
        &context.db().pool,
        &CreateImage {
            pod_id: pod.id,
            filename: filename.clone(),
            description: form.description.filter(|d| !d.is_empty()),
        },
    )
    .await;
    let image = match created {
        Ok(image) => image,
        Err(err) => {
            images.remove(&filename).await;
            return Err(err.into());
        }
    };
    tracing::info!(pod_id = pod.id, image_id = image.id, "Added image to pod");

    Ok(ResponseJson(image))
}

pub async fn get_upload(
    State(context): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let stored = context.images().open(&filename).await?;
    let body = Body::from_stream(ReaderStream::new(stored.file));

    Ok((
        [
            (header::CONTENT_TYPE, stored.content_type),
            (header::CONTENT_LENGTH, stored.size_bytes.to_string()),
        ],
        body,
    )
        .into_response())
}

pub fn router() -> Router<AppContext> {
    Router::new().route("/uploads/{filename}", get(get_upload))
}
