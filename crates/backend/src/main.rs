pub mod api;
pub mod routes;
pub mod shared;
pub mod system;
pub mod usecases;

use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use axum::middleware::{self, Next};
    use axum::response::Response;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tower_http::cors::{Any, CorsLayer};

    system::tracing::initialize()?;

    // Простой middleware для логирования запросов
    async fn request_logger(req: Request<Body>, next: Next) -> Response {
        let start = std::time::Instant::now();
        let method = req.method().clone();
        let uri = req.uri().clone();

        let response = next.run(req).await;

        let status = response.status().as_u16();
        let duration = start.elapsed();
        if status < 400 {
            tracing::info!("{:>5}ms | {} {:>6} {}", duration.as_millis(), status, method, uri.path());
        } else {
            tracing::warn!("{:>5}ms | {} {:>6} {}", duration.as_millis(), status, method, uri.path());
        }
        response
    }

    let config = shared::config::load_config()?;

    let api = usecases::u501_import_clientes::HttpClientsApi::new(&config.clients_api)?;
    let throttler = shared::throttle::RequestThrottler::new(config.throttle.clone());
    let executor = Arc::new(usecases::u501_import_clientes::ImportExecutor::new(
        Arc::new(api),
        throttler,
        &config.validation,
    ));
    api::handlers::usecases::initialize_u501(executor.clone())?;

    // Очистка брошенных сессий импорта
    let sessions_config = config.sessions.clone();
    tokio::spawn(async move {
        executor.run_session_cleanup(sessions_config).await;
    });
    tracing::info!(
        "Clients API: {} (throttle: max_concurrent={}, batch_size={})",
        config.clients_api.base_url,
        config.throttle.max_concurrent,
        config.throttle.batch_size
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION]);

    let app = routes::configure_routes()
        .layer(middleware::from_fn(request_logger))
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            anyhow::anyhow!(
                "Invalid server address {}:{}: {}",
                config.server.host,
                config.server.port,
                e
            )
        })?;

    tracing::info!("Attempting to bind server to http://{}", addr);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => {
            tracing::info!("Server successfully bound to {}", addr);
            listener
        }
        Err(e) => {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                tracing::error!(
                    "Error: Port {} is already in use. Please ensure no other process is using this port.",
                    addr.port()
                );
            } else {
                tracing::error!("Failed to bind to {}. Error: {}", addr, e);
            }
            return Err(e.into());
        }
    };

    axum::serve(listener, app).await?;

    Ok(())
}
