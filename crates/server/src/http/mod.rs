use axum::{Router, extract::DefaultBodyLimit, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{AppContext, routes};

pub fn router(context: AppContext) -> Router {
    let api_routes = Router::new()
        .merge(routes::pods::router(&context))
        .merge(routes::images::router());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        // Uploads are streamed to disk without a size cap.
        .layer(DefaultBodyLimit::disable())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use serde_json::{Value, json};
    use test_support::TempRoot;
    use tower::ServiceExt;

    use crate::test_support::test_context;

    const BOUNDARY: &str = "plantpods-test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, file_name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn setup() -> (TempRoot, axum::Router) {
        let root = TempRoot::new();
        let context = test_context(&root).await;
        (root, super::router(context))
    }

    fn tomato_parts<'a>() -> Vec<Part<'a>> {
        vec![
            Part::Text("name", "Tomato A"),
            Part::Text("type", "vegetable"),
            Part::Text("planting_date", "2024-03-01"),
        ]
    }

    async fn create_tomato(app: &axum::Router) -> Value {
        let response = app
            .clone()
            .oneshot(multipart_request("/api/pods", &tomato_parts()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    async fn list_pods(app: &axum::Router) -> Vec<Value> {
        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/pods"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        match body_json(response).await {
            Value::Array(pods) => pods,
            other => panic!("expected array, got {other}"),
        }
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (_root, app) = setup().await;
        let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);
    }

    #[tokio::test]
    async fn create_without_image_then_list() {
        let (root, app) = setup().await;

        let pod = create_tomato(&app).await;
        assert!(pod["id"].is_i64());
        assert_eq!(pod["name"], "Tomato A");
        assert_eq!(pod["type"], "vegetable");
        assert_eq!(pod["planting_date"], "2024-03-01");
        assert!(pod["description"].is_null());
        assert_eq!(pod["images"], json!([]));

        let pods = list_pods(&app).await;
        assert_eq!(pods, vec![pod]);
        assert!(root.uploaded_files().is_empty());
    }

    #[tokio::test]
    async fn create_with_image_stores_and_serves_file() {
        let (root, app) = setup().await;

        let mut parts = vec![Part::File("image", "first.JPG", b"\xff\xd8jpeg-data")];
        parts.extend(tomato_parts());
        parts.push(Part::Text("description", "on the windowsill"));
        let response = app
            .clone()
            .oneshot(multipart_request("/api/pods", &parts))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let pod = body_json(response).await;
        assert_eq!(pod["description"], "on the windowsill");

        let images = pod["images"].as_array().unwrap();
        assert_eq!(images.len(), 1);
        let filename = images[0]["filename"].as_str().unwrap().to_string();
        assert!(filename.starts_with(&format!("{}_", pod["id"])));
        assert!(filename.ends_with(".jpg"));
        assert_eq!(images[0]["pod_id"], pod["id"]);
        assert_eq!(root.uploaded_files(), vec![filename.clone()]);

        let listed = list_pods(&app).await;
        assert_eq!(listed[0]["images"].as_array().unwrap().len(), 1);

        let response = app
            .oneshot(empty_request("GET", &format!("/api/uploads/{filename}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/jpeg"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"\xff\xd8jpeg-data");
    }

    #[tokio::test]
    async fn create_with_empty_file_part_has_no_image() {
        let (root, app) = setup().await;

        let mut parts = tomato_parts();
        parts.push(Part::File("image", "", b""));
        let response = app
            .oneshot(multipart_request("/api/pods", &parts))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["images"], json!([]));
        assert!(root.uploaded_files().is_empty());
    }

    #[tokio::test]
    async fn create_with_malformed_date_is_rejected_and_discards_upload() {
        let (root, app) = setup().await;

        let parts = vec![
            Part::Text("name", "Tomato A"),
            Part::Text("type", "vegetable"),
            Part::Text("planting_date", "01/03/2024"),
            Part::File("image", "leaf.png", b"png"),
        ];
        let response = app
            .clone()
            .oneshot(multipart_request("/api/pods", &parts))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);

        assert!(list_pods(&app).await.is_empty());
        assert!(root.uploaded_files().is_empty());
    }

    #[tokio::test]
    async fn create_with_missing_or_blank_fields_is_unprocessable() {
        let (_root, app) = setup().await;

        let missing_name = vec![
            Part::Text("type", "vegetable"),
            Part::Text("planting_date", "2024-03-01"),
        ];
        let response = app
            .clone()
            .oneshot(multipart_request("/api/pods", &missing_name))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let blank_name = vec![
            Part::Text("name", "  "),
            Part::Text("type", "vegetable"),
            Part::Text("planting_date", "2024-03-01"),
        ];
        let response = app
            .clone()
            .oneshot(multipart_request("/api/pods", &blank_name))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        assert!(list_pods(&app).await.is_empty());
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let (_root, app) = setup().await;
        let pod = create_tomato(&app).await;
        let uri = format!("/api/pods/{}", pod["id"]);

        let response = app
            .clone()
            .oneshot(json_request("PUT", &uri, json!({ "description": "thriving" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["id"], pod["id"]);
        assert_eq!(updated["name"], "Tomato A");
        assert_eq!(updated["type"], "vegetable");
        assert_eq!(updated["planting_date"], "2024-03-01");
        assert_eq!(updated["description"], "thriving");

        let response = app
            .clone()
            .oneshot(json_request("PUT", &uri, json!({ "planting_date": "2024-03-05" })))
            .await
            .unwrap();
        let updated = body_json(response).await;
        assert_eq!(updated["planting_date"], "2024-03-05");
        assert_eq!(updated["description"], "thriving");

        let response = app
            .oneshot(json_request("PUT", &uri, json!({ "description": null })))
            .await
            .unwrap();
        let updated = body_json(response).await;
        assert!(updated["description"].is_null());
        assert_eq!(updated["name"], "Tomato A");
    }

    #[tokio::test]
    async fn update_missing_pod_is_not_found() {
        let (_root, app) = setup().await;
        let response = app
            .oneshot(json_request("PUT", "/api/pods/999", json!({ "name": "Ghost" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_with_blank_name_is_unprocessable() {
        let (_root, app) = setup().await;
        let pod = create_tomato(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/pods/{}", pod["id"]),
                json!({ "name": "" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(list_pods(&app).await[0]["name"], "Tomato A");
    }

    #[tokio::test]
    async fn delete_removes_pod_and_images_but_keeps_files() {
        let (root, app) = setup().await;
        let pod = create_tomato(&app).await;
        let uri = format!("/api/pods/{}", pod["id"]);

        let response = app
            .clone()
            .oneshot(multipart_request(
                &format!("{uri}/images"),
                &[Part::File("image", "leaf.png", b"png-bytes")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let image = body_json(response).await;

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", &uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());

        assert!(list_pods(&app).await.is_empty());
        // Image files outlive their rows.
        assert_eq!(
            root.uploaded_files(),
            vec![image["filename"].as_str().unwrap().to_string()]
        );

        let response = app.oneshot(empty_request("DELETE", &uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn add_image_to_missing_pod_writes_nothing() {
        let (root, app) = setup().await;

        let response = app
            .oneshot(multipart_request(
                "/api/pods/42/images",
                &[Part::File("image", "leaf.png", b"png-bytes")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(root.uploaded_files().is_empty());
    }

    #[tokio::test]
    async fn add_image_requires_image_field() {
        let (root, app) = setup().await;
        let pod = create_tomato(&app).await;

        let response = app
            .oneshot(multipart_request(
                &format!("/api/pods/{}/images", pod["id"]),
                &[Part::Text("description", "no file")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(root.uploaded_files().is_empty());
    }

    #[tokio::test]
    async fn add_image_with_empty_file_part_is_unprocessable() {
        let (root, app) = setup().await;
        let pod = create_tomato(&app).await;

        let response = app
            .clone()
            .oneshot(multipart_request(
                &format!("/api/pods/{}/images", pod["id"]),
                &[Part::File("image", "", b"")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(root.uploaded_files().is_empty());
        assert_eq!(list_pods(&app).await[0]["images"], json!([]));
    }

    #[tokio::test]
    async fn concurrent_uploads_get_distinct_filenames() {
        let (root, app) = setup().await;
        let pod = create_tomato(&app).await;
        let uri = format!("/api/pods/{}/images", pod["id"]);

        let upload = |bytes: &'static [u8]| {
            app.clone().oneshot(multipart_request(
                &uri,
                &[
                    Part::File("image", "same.png", bytes),
                    Part::Text("description", "sprout"),
                ],
            ))
        };
        let (first, second) = tokio::join!(upload(&b"one"[..]), upload(&b"two"[..]));
        let first = body_json(first.unwrap()).await;
        let second = body_json(second.unwrap()).await;

        assert_eq!(first["description"], "sprout");
        assert_ne!(first["filename"], second["filename"]);
        assert_ne!(first["id"], second["id"]);
        assert_eq!(root.uploaded_files().len(), 2);

        let pods = list_pods(&app).await;
        assert_eq!(pods[0]["images"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_upload_is_not_found() {
        let (_root, app) = setup().await;

        for uri in ["/api/uploads/1_missing.png", "/api/uploads/..%2Fdb.sqlite"] {
            let response = app.clone().oneshot(empty_request("GET", uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn non_numeric_pod_id_is_rejected() {
        let (_root, app) = setup().await;
        let response = app
            .oneshot(json_request("PUT", "/api/pods/abc", json!({})))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
