use std::io::Cursor;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use iris_client::{ApiClient, ClientError};
use iris_core::Config;
use iris_core::bootstrap::{ingest_with, load_query_engine};
use iris_gateway::{AppState, RateLimits, build_router};
use iris_index::{IndexState, QueryEngine, VectorIndex};
use iris_llm::mock::{MockEmbedder, MockGenerator};
use iris_llm::{AnyEmbedder, AnyGenerator, GenerationClient};
use tower::ServiceExt;

const DIMENSIONS: usize = 256;

// -- Fixtures --

fn embedder() -> AnyEmbedder {
    AnyEmbedder::Mock(MockEmbedder::new(DIMENSIONS))
}

fn config_in(root: &Path) -> Config {
    let mut config = Config::default();
    config.index.dir = root.join("index_store");
    config.index.data_dir = root.join("data");
    config
}

fn write_corpus(data: &Path) {
    std::fs::create_dir_all(data).unwrap();
    std::fs::write(data.join("france.txt"), "Paris is the capital of France.").unwrap();
    std::fs::write(
        data.join("biology.md"),
        "The mitochondria is the powerhouse of the cell.",
    )
    .unwrap();
}

async fn state_for(config: &Config, generator: MockGenerator) -> AppState {
    let engine = load_query_engine(config, embedder()).await.unwrap();
    AppState::new(
        engine,
        GenerationClient::new(AnyGenerator::Mock(generator), Duration::from_secs(5)),
    )
}

fn jpeg() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(16, 16, image::Rgb([20, 120, 220]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

fn text_request(query: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/query/text")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "query": query }).to_string()))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn spawn_server(state: AppState, limits: RateLimits) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(state, limits, 10 * 1024 * 1024);
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

// -- Retrieval scenarios --

#[tokio::test]
async fn paris_question_retrieves_paris_context() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path());
    write_corpus(&config.index.data_dir);

    let report = ingest_with(&config, embedder()).await.unwrap();
    assert_eq!(report.documents, 2);
    assert_eq!(report.fragments, 2);
    assert_eq!(report.dimensions, DIMENSIONS);

    let generator = MockGenerator::with_responses(vec!["Paris.".into()]);
    let app = build_router(
        state_for(&config, generator.clone()).await,
        RateLimits::default(),
        1024 * 1024,
    );

    let resp = app
        .oneshot(text_request("What is the capital of France?"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["answer"], "Paris.");
    assert!(
        json["context"]
            .as_str()
            .unwrap()
            .contains("Paris is the capital of France.")
    );

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Paris is the capital of France."));
    assert!(prompts[0].ends_with("User question: What is the capital of France?"));
}

#[tokio::test]
async fn context_holds_at_most_top_k_fragments() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config_in(tmp.path());
    config.retrieval.top_k = 1;
    write_corpus(&config.index.data_dir);
    std::fs::write(config.index.data_dir.join("extra.txt"), "Rust has no garbage collector.")
        .unwrap();
    ingest_with(&config, embedder()).await.unwrap();

    let engine = load_query_engine(&config, embedder()).await.unwrap();
    assert_eq!(engine.fragment_count(), 3);
    let hits = engine.search("the capital of France").await.unwrap();
    assert_eq!(hits.len(), 1);

    let context = engine.retrieve("the capital of France").await.unwrap();
    assert!(!context.contains("\n\n"));
}

#[tokio::test]
async fn unloaded_index_answers_with_empty_context() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path());

    let state = state_for(&config, MockGenerator::default()).await;
    assert!(!state.engine.is_loaded());

    let resp = build_router(state, RateLimits::default(), 1024 * 1024)
        .oneshot(text_request("anything"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["context"], "");
    assert_eq!(json["answer"], "mock answer");
}

#[tokio::test]
async fn reingest_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path());
    write_corpus(&config.index.data_dir);

    let first = ingest_with(&config, embedder()).await.unwrap();
    let first_ids: Vec<String> = VectorIndex::load(&config.index.dir)
        .await
        .unwrap()
        .unwrap()
        .fragments()
        .map(|f| f.id.clone())
        .collect();

    let second = ingest_with(&config, embedder()).await.unwrap();
    let second_ids: Vec<String> = VectorIndex::load(&config.index.dir)
        .await
        .unwrap()
        .unwrap()
        .fragments()
        .map(|f| f.id.clone())
        .collect();

    assert_eq!(first, second);
    assert_eq!(first_ids, second_ids);
}

#[tokio::test]
async fn ingest_seeds_missing_data_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path());

    let report = ingest_with(&config, embedder()).await.unwrap();
    assert_eq!(report.documents, 1);
    assert!(config.index.data_dir.join("sample.txt").exists());

    let engine = QueryEngine::open(embedder(), &config.index.dir, 2)
        .await
        .unwrap();
    assert!(engine.is_loaded());
}

// -- Image scenarios --

#[tokio::test]
async fn jpeg_question_is_answered() {
    let state = AppState::new(
        QueryEngine::new(embedder(), IndexState::Unloaded, 2),
        GenerationClient::new(
            AnyGenerator::Mock(MockGenerator::with_responses(vec!["A blue square.".into()])),
            Duration::from_secs(5),
        ),
    );
    let addr = spawn_server(state, RateLimits::default()).await;
    let client = ApiClient::new(&format!("http://{addr}")).unwrap();

    let answer = client
        .ask_image(jpeg(), "square.jpg", Some("What is in this image?"))
        .await
        .unwrap();
    assert_eq!(answer, "A blue square.");
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let state = AppState::new(
        QueryEngine::new(embedder(), IndexState::Unloaded, 2),
        GenerationClient::new(
            AnyGenerator::Mock(MockGenerator::default()),
            Duration::from_secs(5),
        ),
    );
    let addr = spawn_server(state, RateLimits::default()).await;
    let client = ApiClient::new(&format!("http://{addr}")).unwrap();

    let err = client
        .ask_image(b"%PDF-1.4 not an image".to_vec(), "doc.pdf", None)
        .await
        .unwrap_err();
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(message.starts_with("invalid image"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// -- Client over a real socket --

#[tokio::test]
async fn client_round_trip_and_rate_limit() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path());
    write_corpus(&config.index.data_dir);
    ingest_with(&config, embedder()).await.unwrap();

    let state = state_for(&config, MockGenerator::default()).await;
    let addr = spawn_server(
        state,
        RateLimits {
            text: 2,
            image: 2,
            default: 2,
        },
    )
    .await;
    let client = ApiClient::new(&format!("http://{addr}")).unwrap();

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");

    let reply = client.ask_text("capital of France").await.unwrap();
    assert_eq!(reply.answer, "mock answer");
    assert!(reply.context.contains("Paris"));

    let err = client.ask_text("").await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 400, ref message } if message == "query is required"));

    let err = client.ask_text("again").await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 429, ref message } if message == "rate limit exceeded"));

    // health stays available while the text route is throttled
    assert!(client.health().await.is_ok());
}
