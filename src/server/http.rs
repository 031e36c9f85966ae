//! HTTP server implementation
//!
//! hyper http1 with TokioIo, hand-routed on (method, path segments).

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::auth::{AuthContext, Authenticator};
use crate::config::Args;
use crate::db::schemas::UserDoc;
use crate::db::MongoCollection;
use crate::delivery::ThirdPartyClient;
use crate::producer::EventProducer;
use crate::retry::{DeadLetterStore, RetryConfig};
use crate::routes;
use crate::sessions::SessionAuthority;
use crate::types::BeaconError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub auth: Arc<Authenticator>,
    pub authority: Arc<SessionAuthority>,
    pub producer: Arc<EventProducer>,
    pub dead_letters: DeadLetterStore,
    pub delivery: Arc<ThirdPartyClient>,
    pub retry_config: RetryConfig,
    pub users: MongoCollection<UserDoc>,
    shutting_down: AtomicBool,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        args: Args,
        auth: Arc<Authenticator>,
        authority: Arc<SessionAuthority>,
        producer: Arc<EventProducer>,
        dead_letters: DeadLetterStore,
        delivery: Arc<ThirdPartyClient>,
        retry_config: RetryConfig,
        users: MongoCollection<UserDoc>,
    ) -> Self {
        Self {
            args,
            auth,
            authority,
            producer,
            dead_letters,
            delivery,
            retry_config,
            users,
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Relaxed)
    }
}

/// Start the HTTP server; returns when shutdown is signalled
pub async fn run(
    state: Arc<AppState>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), BeaconError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Beacon listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);

                            let service = service_fn(move |req| {
                                let state = Arc::clone(&state);
                                async move { handle_request(state, addr, req).await }
                            });

                            if let Err(err) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!("Error serving connection from {}: {:?}", addr, err);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {:?}", e);
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                state.shutting_down.store(true, Ordering::Relaxed);
                info!("Accept loop closed");
                return Ok(());
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let authorization = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    debug!("[{}] {} {}", addr, method, path);

    let body = req.into_body().collect().await?.to_bytes();

    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let response = match (&method, segments.as_slice()) {
        // Operational surface, unauthenticated
        (&Method::GET, ["health"]) => routes::health_check(state),
        (&Method::GET, ["ready"]) => routes::readiness_check(state),
        (&Method::GET, ["version"]) => routes::version_info(),
        (&Method::GET, ["retry", "stats"]) => routes::handle_retry_stats(state).await,

        // Auth
        (&Method::POST, ["auth", "login"]) => routes::handle_login(state, body).await,
        (&Method::POST, ["auth", "logout"]) => {
            routes::handle_logout(state, authorization.as_deref()).await
        }

        // Tracking sessions and fixes, all behind bearer auth
        (&Method::POST, ["session", "start"]) => {
            match authenticate(&state, authorization.as_deref()).await {
                Ok(ctx) => routes::handle_start_session(state, &ctx, body).await,
                Err(response) => response,
            }
        }
        (&Method::POST, ["session", id, "stop"]) => {
            match authenticate(&state, authorization.as_deref()).await {
                Ok(ctx) => routes::handle_stop_session(state, &ctx, id).await,
                Err(response) => response,
            }
        }
        (&Method::GET, ["session", id, "locations"]) => {
            match authenticate(&state, authorization.as_deref()).await {
                Ok(ctx) => routes::handle_session_locations(state, &ctx, id).await,
                Err(response) => response,
            }
        }
        (&Method::GET, ["session", id]) => {
            match authenticate(&state, authorization.as_deref()).await {
                Ok(ctx) => routes::handle_get_session(state, &ctx, id).await,
                Err(response) => response,
            }
        }
        (&Method::GET, ["sessions"]) => {
            match authenticate(&state, authorization.as_deref()).await {
                Ok(ctx) => routes::handle_list_sessions(state, &ctx).await,
                Err(response) => response,
            }
        }
        (&Method::POST, ["update"]) => {
            match authenticate(&state, authorization.as_deref()).await {
                Ok(ctx) => routes::handle_location_update(state, &ctx, body).await,
                Err(response) => response,
            }
        }

        _ => routes::not_found(&path),
    };

    Ok(response)
}

/// Authenticate a request, mapping failures to their error response
async fn authenticate(
    state: &Arc<AppState>,
    authorization: Option<&str>,
) -> Result<AuthContext, Response<Full<Bytes>>> {
    state
        .auth
        .authenticate(authorization)
        .await
        .map_err(|e| routes::error(&e))
}
