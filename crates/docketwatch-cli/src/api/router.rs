use axum::Router;
use axum::routing::{get, post};

use super::ApiContext;
use super::{auth, endpoints};

/// Build the `/api` router.
///
/// Layers: Extension (outermost) -> API key check -> handler.
/// Path params use `:param` syntax (axum 0.7).
pub fn router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/sweep", post(endpoints::sweep))
        .route("/matters", get(endpoints::list_matters).post(endpoints::register_matter))
        .route("/matters/process", post(endpoints::process_many))
        .route("/matters/:id/process", post(endpoints::process_one))
        .route("/scheduler/start", post(endpoints::scheduler_start))
        .route("/scheduler/stop", post(endpoints::scheduler_stop))
        .route("/status", get(endpoints::status))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(auth::require_api_key))
        .layer(axum::Extension(ctx));

    Router::new().nest("/api", api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use docketwatch_core::{FilingType, FixedClock, Matter};
    use docketwatch_host::fakes::{FakeCrm, FakeForms, FakeSource, FakeUploader, RecordingNotifier, doc};
    use docketwatch_host::{
        Cadence, Collaborators, Orchestrator, OrchestratorConfig, OrchestratorParts,
        RuntimeState, Scheduler, SideEffectPipeline, Sources,
    };
    use docketwatch_store::{MatterRegistry, ProcessedStateStore, StatusFile};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::wiring::App;

    struct Fixture {
        _tmp: tempfile::TempDir,
        source: Arc<FakeSource>,
        app: App,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::TempDir::new().unwrap();
            let source = Arc::new(FakeSource::default());
            let orchestrator = Arc::new(Orchestrator::new(OrchestratorParts {
                registry: MatterRegistry::open(tmp.path().join("matters.json")),
                state_store: ProcessedStateStore::new(tmp.path().join("processed_state.json")),
                status_file: StatusFile::new(tmp.path().join("status.json")),
                sources: Sources {
                    patent: source.clone(),
                    trademark: source.clone(),
                },
                pipeline: SideEffectPipeline::new(
                    Collaborators {
                        uploader: Arc::new(FakeUploader::working("https://storage.test")),
                        notifier: Arc::new(RecordingNotifier::default()),
                        crm: Arc::new(FakeCrm::default()),
                        forms: Arc::new(FakeForms::default()),
                    },
                    Duration::from_secs(5),
                ),
                clock: Arc::new(FixedClock::new("2024-03-01".parse().unwrap())),
                runtime: Arc::new(RuntimeState::new()),
                config: OrchestratorConfig {
                    inter_matter_delay: Duration::ZERO,
                },
            }));
            let scheduler = Arc::new(Scheduler::new(
                orchestrator.clone(),
                Cadence::every_minutes(60),
            ));
            Self {
                _tmp: tmp,
                source,
                app: App {
                    orchestrator,
                    scheduler,
                },
            }
        }

        fn register(&self, crm_id: &str, app: &str) {
            let matter = Matter::new(
                crm_id,
                app,
                FilingType::Trademark,
                self.app.orchestrator.clock().now(),
            );
            self.app.orchestrator.registry().register(matter).unwrap();
        }

        fn router(&self, api_key: Option<&str>) -> Router {
            router(ApiContext::new(self.app.clone(), api_key.map(String::from)))
        }
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(v) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn api_key_required_when_configured() {
        let f = Fixture::new();

        let (status, body) = send(f.router(Some("s3cret")), request("GET", "/api/status", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let req = Request::builder()
            .uri("/api/status")
            .header("X-Api-Key", "wrong")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(f.router(Some("s3cret")), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .uri("/api/status")
            .header("X-Api-Key", "s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(f.router(Some("s3cret")), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn open_when_no_key_configured() {
        let f = Fixture::new();
        let (status, body) = send(f.router(None), request("GET", "/api/status", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "idle");
        assert_eq!(body["active_sweeps"], 0);
        assert_eq!(body["scheduler_running"], false);
    }

    #[tokio::test]
    async fn register_and_list_matters() {
        let f = Fixture::new();
        let new = json!({
            "crm_id": "crm-1",
            "application_number": "97/123,456",
            "filing_type": "trademark",
            "title": "ACME"
        });

        let (status, body) = send(f.router(None), request("POST", "/api/matters", Some(new.clone()))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["matter"]["application_number"], "97123456");
        assert_eq!(body["matter"]["status"], "Registered");

        let (status, body) = send(f.router(None), request("POST", "/api/matters", Some(new))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, body) = send(f.router(None), request("GET", "/api/matters", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["matters"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn register_rejects_unknown_filing_type() {
        let f = Fixture::new();
        let new = json!({"crm_id": "crm-1", "application_number": "1", "filing_type": "copyright"});
        let (status, body) = send(f.router(None), request("POST", "/api/matters", Some(new))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("copyright"));
    }

    #[tokio::test]
    async fn process_one_runs_pipeline() {
        let f = Fixture::new();
        f.register("crm-1", "111");
        f.source.set_documents("111", vec![doc("2024-03-01", "Office Action")]);

        let (status, body) = send(f.router(None), request("POST", "/api/matters/crm-1/process", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["matters"][0]["outcome"], "processed");
        assert_eq!(body["matters"][0]["date"], "2024-03-01");
    }

    #[tokio::test]
    async fn process_one_unknown_is_404() {
        let f = Fixture::new();
        let (status, body) = send(f.router(None), request("POST", "/api/matters/ghost/process", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn process_one_in_flight_is_409() {
        let f = Fixture::new();
        f.register("crm-1", "111");
        let _permit = f
            .app
            .orchestrator
            .runtime()
            .guard()
            .try_acquire("crm-1")
            .unwrap();

        let (status, body) = send(f.router(None), request("POST", "/api/matters/crm-1/process", None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["matters"][0]["outcome"], "already_processing");
    }

    #[tokio::test]
    async fn process_many_validates_and_reports() {
        let f = Fixture::new();
        f.register("crm-1", "111");
        f.register("crm-2", "222");

        let (status, _) = send(
            f.router(None),
            request("POST", "/api/matters/process", Some(json!({"matter_ids": []}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            f.router(None),
            request("POST", "/api/matters/process", Some(json!({"matter_ids": ["crm-1", "222"]}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "0 of 2 matter(s) had new documents");
    }

    #[tokio::test]
    async fn scheduler_start_stop() {
        let f = Fixture::new();

        let (_, body) = send(f.router(None), request("POST", "/api/scheduler/start", None)).await;
        assert_eq!(body["success"], true);
        let (_, body) = send(f.router(None), request("POST", "/api/scheduler/start", None)).await;
        assert_eq!(body["success"], false);
        let (_, body) = send(f.router(None), request("GET", "/api/status", None)).await;
        assert_eq!(body["scheduler_running"], true);

        let (_, body) = send(f.router(None), request("POST", "/api/scheduler/stop", None)).await;
        assert_eq!(body["success"], true);
        let (_, body) = send(f.router(None), request("POST", "/api/scheduler/stop", None)).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn sweep_returns_immediately() {
        let f = Fixture::new();
        let (status, body) = send(f.router(None), request("POST", "/api/sweep", None)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "sweep started");
    }
}
