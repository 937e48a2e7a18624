use std::{fs, path::Path, sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{
        Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, HOST, VARY},
    },
};
use folio::{
    application::conversion::{ConversionService, ConversionTemplate, StaticTemplateProvider},
    config::{ConversionSettings, ConverterSettings},
    infra::{
        content::FsContentIndex,
        http::{HttpState, NotFoundPage, build_router},
    },
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let content = dir.path().join("content");
        fs::create_dir_all(content.join("guides")).expect("content dir");
        fs::write(
            content.join("guides/install.md"),
            "# Install\n\nSet up folio.\n",
        )
        .expect("write guide");
        fs::write(content.join("index.md"), "# Handbook\n\nWelcome.\n").expect("write index");
        Self { dir }
    }

    fn scratch_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("scratch")
    }

    fn marker(&self) -> std::path::PathBuf {
        self.dir.path().join("converter-ran")
    }

    fn router(&self, rtf: ConverterSettings) -> Router {
        let settings = ConversionSettings {
            scratch_dir: self.scratch_dir(),
            timeout: Duration::from_secs(10),
            rtf,
            ..ConversionSettings::default()
        };
        let conversion = ConversionService::new(
            Arc::new(settings),
            Arc::new(FsContentIndex::new(self.dir.path().join("content"))),
            Arc::new(StaticTemplateProvider::new(ConversionTemplate::Document)),
        )
        .expect("conversion service");

        build_router(HttpState {
            conversion: Arc::new(conversion),
            fallback: Arc::new(NotFoundPage),
        })
    }

    fn scratch_entries(&self) -> usize {
        fs::read_dir(self.scratch_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[cfg(unix)]
    fn script(&self, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = self.dir.path().join(name);
        fs::write(&path, body).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set perms");
        path.display().to_string()
    }

    #[cfg(unix)]
    fn copying_tool(&self) -> String {
        let body = format!(
            r#"#!/bin/sh
set -eu
touch "{marker}"
while [ "$#" -gt 0 ]; do
  case "$1" in
    -s) shift; src="$1" ;;
    -o) shift; out="$1" ;;
  esac
  shift
done
cp "$src" "$out"
"#,
            marker = self.marker().display()
        );
        self.script("copy-converter", &body)
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(HOST, "docs.example.org")
        .body(Body::empty())
        .expect("request")
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn assert_no_marker(path: &Path) {
    assert!(!path.exists(), "converter must not run");
}

#[tokio::test]
async fn health_endpoint_returns_no_content() {
    let app = TestApp::new();
    let response = app
        .router(ConverterSettings::default())
        .oneshot(get("/_health"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn non_conversion_paths_use_fallback() {
    let app = TestApp::new();
    let response = app
        .router(ConverterSettings::enabled_with("cp"))
        .oneshot(get("/guides/install"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Page Not Found"));
}

#[tokio::test]
async fn disabled_and_unconfigured_behave_alike() {
    let app = TestApp::new();

    for settings in [
        ConverterSettings {
            enabled: false,
            tool: Some("cp".to_string()),
            ..ConverterSettings::default()
        },
        ConverterSettings {
            enabled: true,
            tool: None,
            ..ConverterSettings::default()
        },
    ] {
        let response = app
            .router(settings)
            .oneshot(get("/guides/install.rtf"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(CONTENT_DISPOSITION).is_none());
    }
    assert_eq!(app.scratch_entries(), 0);
    assert_no_marker(&app.marker());
}

#[tokio::test]
async fn malformed_paths_are_rejected() {
    let app = TestApp::new();
    let response = app
        .router(ConverterSettings::enabled_with("cp"))
        .oneshot(get("/guides/a%3Ab.rtf"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.scratch_entries(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn missing_content_returns_not_found_without_artifacts() {
    let app = TestApp::new();
    let tool = app.copying_tool();
    let response = app
        .router(ConverterSettings::enabled_with(tool))
        .oneshot(get("/guides/missing.rtf"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.scratch_entries(), 0);
    assert_no_marker(&app.marker());
}

#[cfg(unix)]
#[tokio::test]
async fn converted_document_is_streamed_as_attachment() {
    let app = TestApp::new();
    let tool = app.copying_tool();
    let response = app
        .router(ConverterSettings::enabled_with(tool))
        .oneshot(get("/guides/install.rtf"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[CONTENT_TYPE], "application/rtf; charset=utf-8");
    assert_eq!(headers[CACHE_CONTROL], "max-age=60");
    assert_eq!(headers[VARY], "accept-encoding");
    assert_eq!(
        headers[CONTENT_DISPOSITION],
        "attachment; filename=\"install.rtf\""
    );

    let body = body_text(response).await;
    assert!(body.contains("<h1>Install</h1>"), "unexpected body: {body}");
    assert!(body.contains("Set up folio."));
    assert_eq!(app.scratch_entries(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn root_item_is_converted_and_named_after_its_title() {
    let app = TestApp::new();
    let tool = app.copying_tool();
    let router = app.router(ConverterSettings::enabled_with(tool));

    let response = router
        .clone()
        .oneshot(get("/guides/installrtf"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router.oneshot(get("/rtf")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_DISPOSITION],
        "attachment; filename=\"Handbook.rtf\""
    );
    assert!(body_text(response).await.contains("Welcome."));
}

#[cfg(unix)]
#[tokio::test]
async fn failing_converter_returns_error_without_body() {
    let app = TestApp::new();
    let tool = app.script(
        "failing-converter",
        "#!/bin/sh\necho \"conversion exploded\" >&2\nexit 2\n",
    );
    let response = app
        .router(ConverterSettings::enabled_with(tool))
        .oneshot(get("/guides/install.rtf"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(CONTENT_DISPOSITION).is_none());
    let body = body_text(response).await;
    assert!(!body.contains("Set up folio."));
    assert_eq!(app.scratch_entries(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn hung_converter_times_out() {
    let app = TestApp::new();
    let tool = app.script("slow-converter", "#!/bin/sh\nexec sleep 30\n");

    let settings = ConversionSettings {
        scratch_dir: app.scratch_dir(),
        timeout: Duration::from_millis(200),
        rtf: ConverterSettings::enabled_with(tool),
        ..ConversionSettings::default()
    };
    let conversion = ConversionService::new(
        Arc::new(settings),
        Arc::new(FsContentIndex::new(app.dir.path().join("content"))),
        Arc::new(StaticTemplateProvider::new(ConversionTemplate::Document)),
    )
    .expect("conversion service");
    let router = build_router(HttpState {
        conversion: Arc::new(conversion),
        fallback: Arc::new(NotFoundPage),
    });

    let response = router
        .oneshot(get("/guides/install.rtf"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(app.scratch_entries(), 0);
}
