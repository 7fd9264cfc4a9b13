use axum::body::Bytes;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use doc_chat_lib::api::{ApiError, ApiOperation, BackendGateway, QueryRequest, UploadProgress};
use doc_chat_lib::db::models::{DocumentFile, MessageId, ProcessingStatus, Role};
use doc_chat_lib::HttpGateway;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn serve(router: Router) -> HttpGateway {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    HttpGateway::new(format!("http://{}/api/", addr), Duration::from_secs(5)).unwrap()
}

fn backend() -> Router {
    Router::new()
        .route(
            "/api/documents/upload/",
            post(|body: Bytes| async move {
                let text = String::from_utf8_lossy(&body);
                assert!(text.contains("name=\"file\""));
                assert!(text.contains("filename=\"report.pdf\""));
                (
                    StatusCode::CREATED,
                    Json(json!({
                        "document": {
                            "id": 42,
                            "original_filename": "report.pdf",
                            "file_size": 300000,
                            "processing_status": "pending",
                            "chunk_count": 0
                        }
                    })),
                )
            }),
        )
        .route(
            "/api/documents/{id}/",
            get(|Path(id): Path<String>| async move {
                if id != "42" {
                    return Err((StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))));
                }
                Ok(Json(json!({
                    "id": "42",
                    "original_filename": "report.pdf",
                    "file_size": 300000,
                    "processing_status": "completed",
                    "chunk_count": 12
                })))
            })
            .delete(|| async { StatusCode::NO_CONTENT }),
        )
        .route(
            "/api/chat/conversations/{id}/messages/",
            get(|| async {
                Json(json!({
                    "results": [
                        {"id": 1, "role": "user", "content": "Hi", "created_at": "2024-05-01T10:00:00Z"},
                        {"id": 2, "role": "assistant", "content": "Hello", "created_at": "2024-05-01T10:00:02Z",
                         "sources": [{"page_number": 3, "content": "intro", "relevance_score": 1.4}]}
                    ]
                }))
            }),
        )
        .route(
            "/api/chat/conversations/{id}/",
            delete(|| async { StatusCode::NO_CONTENT }),
        )
}

#[tokio::test]
async fn test_upload_streams_file_and_reports_progress() {
    let gateway = serve(backend()).await;
    let file = DocumentFile::new("report.pdf", "application/pdf", vec![7u8; 300_000]);
    let seen: Arc<Mutex<Vec<UploadProgress>>> = Arc::default();
    let recorder = seen.clone();

    let document = gateway
        .upload_document(&file, &move |p| recorder.lock().unwrap().push(p))
        .await
        .unwrap();

    assert_eq!(document.id, "42");
    assert_eq!(document.processing_status, ProcessingStatus::Pending);
    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0].loaded <= w[1].loaded));
    assert_eq!(seen.last().unwrap().percent(), 100);
}

#[tokio::test]
async fn test_query_round_trip() {
    let captured: Arc<Mutex<Option<Value>>> = Arc::default();
    let sink = captured.clone();
    let router = Router::new().route(
        "/api/chat/query/",
        post(move |Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                *sink.lock().unwrap() = Some(body);
                Json(json!({
                    "answer": "It is a quarterly report.",
                    "conversation_id": 9,
                    "sources": [{"page_number": 1, "text": "Q3 results", "relevance_score": 0.82}],
                    "metadata": {"message_id": 77}
                }))
            }
        }),
    );
    let gateway = serve(router).await;

    let response = gateway
        .query(&QueryRequest {
            question: "What is this about?".into(),
            conversation_id: None,
            document_filter: vec!["42".into()],
            top_k: 5,
        })
        .await
        .unwrap();

    assert_eq!(response.answer, "It is a quarterly report.");
    assert_eq!(response.conversation_id.as_deref(), Some("9"));
    assert_eq!(response.message_id(), Some("77"));
    assert_eq!(response.sources.len(), 1);

    let body = captured.lock().unwrap().clone().unwrap();
    assert_eq!(body["question"], "What is this about?");
    assert_eq!(body["document_filter"], json!(["42"]));
    assert_eq!(body["top_k"], 5);
    assert!(body["conversation_id"].is_null());
}

#[tokio::test]
async fn test_server_error_carries_detail() {
    let router = Router::new().route(
        "/api/chat/query/",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": "Document is still processing"})),
            )
        }),
    );
    let gateway = serve(router).await;

    let err = gateway
        .query(&QueryRequest {
            question: "q".into(),
            conversation_id: Some("c1".into()),
            document_filter: vec!["1".into()],
            top_k: 5,
        })
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(err.operation(), ApiOperation::Query);
    assert_eq!(err.to_string(), "Document is still processing");
}

#[tokio::test]
async fn test_server_error_without_detail_uses_generic_message() {
    let router = Router::new().route(
        "/api/documents/{id}/",
        delete(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let gateway = serve(router).await;

    let err = gateway.delete_document("42").await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "An error occurred");
}

#[tokio::test]
async fn test_unreachable_backend_is_no_response() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let gateway =
        HttpGateway::new(format!("http://{}/api", addr), Duration::from_secs(2)).unwrap();

    let err = gateway.delete_conversation("c1").await.unwrap_err();
    assert!(matches!(err, ApiError::NoResponse { .. }));
    assert_eq!(err.status(), None);
    assert_eq!(
        err.to_string(),
        "No response from server. Please check if the backend is running."
    );
}

#[tokio::test]
async fn test_document_details_and_deletes() {
    let gateway = serve(backend()).await;

    let document = gateway.document_details("42").await.unwrap();
    assert_eq!(document.processing_status, ProcessingStatus::Completed);
    assert_eq!(document.chunk_count, 12);

    let err = gateway.document_details("7").await.unwrap_err();
    assert_eq!(err.to_string(), "Not found.");

    gateway.delete_document("42").await.unwrap();
    gateway.delete_conversation("c1").await.unwrap();
}

#[tokio::test]
async fn test_conversation_history_decodes_backend_messages() {
    let gateway = serve(backend()).await;

    let messages = gateway.conversation_messages("c1").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, MessageId::Remote("1".into()));
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].sources[0].text, "intro");
    assert_eq!(messages[1].sources[0].relevance_score, Some(1.0));
}

#[tokio::test]
async fn test_undecodable_body_is_unexpected() {
    let router = Router::new().route(
        "/api/chat/conversations/{id}/messages/",
        get(|| async { "not json" }),
    );
    let gateway = serve(router).await;

    let err = gateway.conversation_messages("c1").await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Unexpected {
            operation: ApiOperation::History,
            ..
        }
    ));
}
