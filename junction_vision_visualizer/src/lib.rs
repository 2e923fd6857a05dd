pub mod overlay;
pub mod view;

use junction_vision::MetricsStore;
use overlay::OverlayRenderer;
use std::sync::{Arc, Mutex};
use view::FrameRate;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Pixel size of the detector frames, for scaling the overlay.
    pub source_width: u32,
    pub source_height: u32,
}

impl ServerConfig {
    /// Reads `JV_BIND`, defaulting to `127.0.0.1:5000`.
    pub fn from_env(source_width: u32, source_height: u32) -> Self {
        Self {
            bind_addr: std::env::var("JV_BIND").unwrap_or_else(|_| "127.0.0.1:5000".to_string()),
            source_width,
            source_height,
        }
    }
}

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub store: MetricsStore,
    pub overlay: OverlayRenderer,
    /// Fed by a watcher task on every publish.
    pub frames: Arc<Mutex<FrameRate>>,
}

#[cfg(feature = "web")]
pub async fn start_server(
    store: MetricsStore,
    cfg: ServerConfig,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    use crate::view::{CameraStatusView, TrafficDataView};
    use std::sync::PoisonError;
    use std::time::Instant;
    use axum::body::Body;
    use axum::extract::State;
    use axum::http::{HeaderValue, header};
    use axum::response::{Html, IntoResponse, Response};
    use axum::{Json, Router, routing::get};
    use bytes::{BufMut, BytesMut};
    use tracing::{info, warn};

    const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><title>Junction Vision</title></head>
<body style="background:#111;color:#ddd;font-family:monospace">
  <h2>Junction Vision</h2>
  <img src="/video_feed" width="800" height="300" style="border:1px solid #444"/>
  <pre id="data">waiting for first tick...</pre>
  <script>
    async function poll(){
      try {
        const r = await fetch('/traffic_data');
        document.getElementById('data').textContent = JSON.stringify(await r.json(), null, 2);
      } catch(e) { console.error(e); }
    }
    poll(); setInterval(poll, 2000);
  </script>
</body>
</html>"#;

    async fn index() -> Html<&'static str> {
        Html(INDEX_HTML)
    }

    async fn traffic_data(State(app): State<AppState>) -> Json<TrafficDataView> {
        Json(TrafficDataView::from(app.store.read_state().as_ref()))
    }

    async fn full_state(State(app): State<AppState>) -> Json<junction_vision::JunctionSnapshot> {
        Json(app.store.read_state().as_ref().clone())
    }

    async fn camera(State(app): State<AppState>) -> Json<CameraStatusView> {
        let s = app.store.read_state();
        let fps = app
            .frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fps(Instant::now());
        Json(CameraStatusView::new(&s, fps))
    }

    // One JPEG part per published snapshot, for as long as the client listens.
    async fn video_feed(State(app): State<AppState>) -> impl IntoResponse {
        let mut rx = app.store.subscribe();
        let overlay = app.overlay;
        let stream = async_stream::stream! {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                match overlay.render_jpeg(&snapshot) {
                    Ok(jpeg) => {
                        let mut part = BytesMut::with_capacity(jpeg.len() + 64);
                        part.put_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
                        part.put_slice(&jpeg);
                        part.put_slice(b"\r\n");
                        yield Ok::<_, std::io::Error>(part.freeze());
                    }
                    Err(e) => warn!(error = %e, "overlay encode failed"),
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        };

        let mut resp = Response::new(Body::from_stream(stream));
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("multipart/x-mixed-replace; boundary=frame"),
        );
        resp
    }

    let frames = Arc::new(Mutex::new(FrameRate::default()));
    let mut published = store.subscribe();
    let meter = Arc::clone(&frames);
    tokio::spawn(async move {
        while published.changed().await.is_ok() {
            meter
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(Instant::now());
        }
    });

    let state = AppState {
        store,
        overlay: OverlayRenderer::new(cfg.source_width, cfg.source_height),
        frames,
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/traffic_data", get(traffic_data))
        .route("/state", get(full_state))
        .route("/camera_status", get(camera))
        .route("/video_feed", get(video_feed))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    info!(addr = %cfg.bind_addr, "visualizer server listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "visualizer server stopped");
        }
    });

    Ok(server)
}

#[cfg(not(feature = "web"))]
pub async fn start_server(
    _store: MetricsStore,
    _cfg: ServerConfig,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    Err(anyhow::anyhow!("web feature not enabled for junction_vision_visualizer"))
}
