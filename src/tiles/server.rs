//! In-process HTTP server that re-serves local tile archives
//!
//! Some renderers only load tiles by URL. The server binds an ephemeral
//! port on the loopback interface and answers `GET /{source}/{z}/{x}/{y}`
//! from whichever `TileSource` was registered under `source`, with the
//! content type and encoding the source declares.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use fxhash::FxHashMap;
use once_cell::sync::OnceCell;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

use crate::core::geo::TileCoord;
use crate::tiles::source::TileSource;
use crate::{MapError, Result};

type SourceMap = Arc<RwLock<FxHashMap<String, Arc<dyn TileSource>>>>;

static SHARED: OnceCell<TileHttpServer> = OnceCell::new();

pub struct TileHttpServer {
    port: u16,
    sources: SourceMap,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TileHttpServer {
    /// Binds `127.0.0.1` on a free port and starts serving on a dedicated thread.
    pub fn start() -> Result<Self> {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).map_err(MapError::Io)?;
        listener.set_nonblocking(true).map_err(MapError::Io)?;
        let port = listener.local_addr().map_err(MapError::Io)?.port();

        let sources: SourceMap = Arc::default();
        let app = router(sources.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("tile-server".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        log::error!("tile server runtime failed to start: {}", e);
                        return;
                    }
                };

                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(listener) => listener,
                        Err(e) => {
                            log::error!("tile server could not adopt its socket: {}", e);
                            return;
                        }
                    };
                    let shutdown = async {
                        let _ = shutdown_rx.await;
                    };
                    if let Err(e) = axum::serve(listener, app)
                        .with_graceful_shutdown(shutdown)
                        .await
                    {
                        log::error!("tile server stopped: {}", e);
                    }
                });
            })
            .map_err(MapError::Io)?;

        log::info!("tile server listening on 127.0.0.1:{}", port);
        Ok(Self {
            port,
            sources,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// The process-wide server, started on first use.
    pub fn shared() -> Result<&'static TileHttpServer> {
        SHARED.get_or_try_init(Self::start)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Registers `source` under `id`, replacing any earlier source with that
    /// id, and returns its URL template.
    pub fn add_source(&self, id: &str, source: Arc<dyn TileSource>) -> String {
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), source);
        log::debug!("tile server now serving {}", id);
        self.url_template(id)
    }

    pub fn remove_source(&self, id: &str) -> bool {
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// `http://localhost:{port}/{id}/{z}/{x}/{y}`
    pub fn url_template(&self, id: &str) -> String {
        format!("http://localhost:{}/{}/{{z}}/{{x}}/{{y}}", self.port, id)
    }
}

impl Drop for TileHttpServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("tile server thread panicked");
            }
        }
    }
}

fn router(sources: SourceMap) -> Router {
    Router::new()
        .route("/:id/:z/:x/:y", get(serve_tile))
        .with_state(sources)
}

async fn serve_tile(
    State(sources): State<SourceMap>,
    Path((id, z, x, y)): Path<(String, u8, u32, u32)>,
) -> Response {
    let source = sources
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
        .cloned();
    let Some(source) = source else {
        return (StatusCode::NOT_FOUND, "tile source not found").into_response();
    };

    let coord = TileCoord::new(x, y, z);
    let Some(blob) = source.tile_blob(coord) else {
        log::debug!("no tile {:?} in {}", coord, id);
        return (StatusCode::NOT_FOUND, "tile not found").into_response();
    };

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, source.content_type().to_string())],
        blob,
    )
        .into_response();

    let encoding = source.content_encoding();
    if encoding != "identity" {
        if let Ok(value) = HeaderValue::from_str(encoding) {
            response.headers_mut().insert(header::CONTENT_ENCODING, value);
        }
    }
    response
}
