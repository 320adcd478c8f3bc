use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::routing::get;
use rstest::fixture;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use super::init_tracing;

const MAIN: &str = r"
openapi: 3.0.3
info:
  title: Remote
  version: 1.0.0
paths:
  /users:
    get:
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                $ref: schemas/user.yaml
";

const USER: &str = r"
type: object
properties:
  name:
    type: string
  error:
    $ref: ../common#/Error
";

const COMMON: &str = r#"{"Error": {"type": "object", "properties": {"message": {"type": "string"}}}}"#;

/// Serves API description files over HTTP on a random local port.
#[derive(Debug)]
pub struct RemoteApi {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl RemoteApi {
    pub async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, router()).await {
                panic!("server failed: {error:?}");
            }
        });
        info!(%addr, "remote API started");

        Ok(Self { addr, handle })
    }

    /// The URL of `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for RemoteApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router() -> Router {
    Router::new()
        .route("/api/main.yaml", get(|| async { MAIN }))
        .route(
            "/api/schemas/user.yaml",
            get(|| async { ([(CONTENT_TYPE, "application/yaml")], USER) }),
        )
        .route(
            "/api/common",
            get(|| async { ([(CONTENT_TYPE, "application/json")], COMMON) }),
        )
        .route("/api/huge.yaml", get(|| async { "#".repeat(4096) }))
        .route(
            "/api/slow.yaml",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "type: string\n"
            }),
        )
        .route(
            "/api/escape.yaml",
            get(|| async { "secret:\n  $ref: file:///etc/passwd\n" }),
        )
}

#[fixture]
pub async fn remote() -> RemoteApi {
    init_tracing();
    match RemoteApi::start().await {
        Ok(remote) => remote,
        Err(error) => {
            panic!("fail to start remote API: {error:?}");
        }
    }
}
