pub mod handlers;
pub mod routes;
pub mod state;

use crate::config::WebConfig;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    routes::api_routes().with_state(state)
}

pub async fn run_server(config: WebConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = app(state).layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .on_request(
                        |request: &axum::http::Request<axum::body::Body>, _span: &tracing::Span| {
                            info!("Received request: {} {}", request.method(), request.uri());
                        },
                    )
                    .on_failure(
                        |error: ServerErrorsFailureClass,
                         latency: std::time::Duration,
                         _span: &tracing::Span| {
                            tracing::error!(
                                "Request failed: {:?} (took {} ms)",
                                error,
                                latency.as_millis()
                            );
                        },
                    ),
            )
            .layer(cors)
            .layer(CompressionLayer::new()),
    );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::db::testing::ScriptedDatabase;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::{LanguageModel, ModelRoles};
    use crate::llm::embedding::HashingEmbedder;
    use crate::pipeline::Pipeline;
    use crate::pipeline::models::PipelineResult;
    use crate::schema::SchemaCatalog;
    use crate::store::ExampleStore;
    use crate::store::memory::InMemoryStore;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const BOUNDARY: &str = "nlsqlboundary";

    fn test_app(with_store: bool, analysis_reply: &str) -> Router {
        let model: Arc<dyn LanguageModel> = ScriptedModel::replying(analysis_reply);
        let roles = ModelRoles {
            analysis: model.clone(),
            sql: model.clone(),
            answer: model,
        };
        let store: Option<Arc<dyn ExampleStore>> = with_store.then(|| {
            Arc::new(InMemoryStore::new(
                "examples",
                Arc::new(HashingEmbedder::new(64).unwrap()),
            )) as Arc<dyn ExampleStore>
        });
        let pipeline = Pipeline::new(
            &SchemaCatalog::builtin(),
            roles,
            store.clone(),
            Some(Arc::new(ScriptedDatabase::rows("1"))),
            &PipelineConfig::default(),
        );
        app(Arc::new(AppState::new(pipeline, store)))
    }

    fn multipart(file_name: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: application/json\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = file_name,
            c = content
        );
        Request::post("/add-examples")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
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

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = send(app, request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_configured_backends() {
        let app = test_app(true, "");
        let (status, body) = send_json(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database_status"], "connected");
        assert_eq!(body["vector_store_status"], "available");
        assert_eq!(body["collection"], "examples");

        let app = test_app(false, "");
        let (_, body) = send_json(&app, get("/health")).await;
        assert_eq!(body["vector_store_status"], "not available");
        assert!(body["collection"].is_null());
    }

    #[tokio::test]
    async fn process_query_always_returns_a_result() {
        let app = test_app(false, "not json at all");
        let (status, bytes) = send(
            &app,
            json_request("POST", "/process-query", json!({"user_question": "no"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let result: PipelineResult = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(result.original_question, "no");
        assert!(result.analysis.is_none());
        assert!(result.error_message.is_some());
    }

    #[tokio::test]
    async fn curation_requires_a_store() {
        let app = test_app(false, "");
        let (status, _) = send(&app, multipart("examples.json", "[]")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = send(&app, get("/get-all-examples")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = send(&app, json_request("DELETE", "/delete-example/1", json!({}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn upload_validates_file_and_document() {
        let app = test_app(true, "");

        let (status, body) = send(&app, multipart("examples.csv", "[]")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "Invalid file type. Please upload a JSON file."
        );

        let (status, body) = send(&app, multipart("examples.json", r#"{"nl": "Q"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(body).unwrap().contains("must be an array"));

        let (status, _) = send(&app, multipart("examples.json", "[{")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_then_page_then_delete() {
        let app = test_app(true, "");

        let (status, body) = send_json(
            &app,
            multipart(
                "examples.json",
                r#"[{"nl":"Q1","id":5},{"nl":"Q2","id":"not-an-id"},{"nl":""}]"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["added"], 2);
        assert_eq!(
            body["message"],
            "Successfully processed file 'examples.json'. Added 2 documents to the vector store."
        );

        let (status, body) = send_json(&app, get("/get-all-examples?limit=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["points"][0]["id"], 5);
        assert_eq!(body["points"][0]["payload"]["page_content"], "Q1");
        let next = body["next_offset"].as_str().unwrap().to_string();

        let (_, body) = send_json(
            &app,
            get(&format!("/get-all-examples?limit=1&offset={}", next)),
        )
        .await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["points"][0]["id"], next.as_str());
        assert!(body["next_offset"].is_null());

        let (status, body) =
            send_json(&app, json_request("DELETE", "/delete-example/5", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["point_id_deleted"], 5);

        let (status, _) = send(&app, json_request("DELETE", "/delete-example/5", json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn listing_validates_limit_and_offset() {
        let app = test_app(true, "");
        let (status, _) = send(&app, get("/get-all-examples?limit=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, get("/get-all-examples?limit=1001")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, get("/get-all-examples?offset=page-2")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "Invalid offset format. Must be a valid UUID or integer string."
        );
    }

    #[tokio::test]
    async fn single_add_returns_generated_id() {
        let app = test_app(true, "");
        let (status, body) = send_json(
            &app,
            json_request(
                "POST",
                "/add-single-example",
                json!({"nl": "How many tracks?", "sql": "SELECT COUNT(*) FROM Track", "id": "9"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["added_document_info"]["nl_content"], "How many tracks?");
        let id = body["added_document_info"]["point_id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());

        let (status, _) = send(
            &app,
            json_request("POST", "/add-single-example", json!({"nl": " "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
