use {
    super::{
        KeyworkService,
        shutdown::{ShutdownNotifier, ShutdownPhase, termination_signal},
    },
    crate::{Config, Env, Result, Router, utils::RequestIdGenerator},
    std::{future::Future, time::Duration},
    tokio::net::TcpListener,
    tower_http::{
        catch_panic::CatchPanicLayer,
        request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
        trace::TraceLayer,
    },
};

/// Wraps the router in the adapter's tower stack: request ids (generated or
/// preserved, and echoed on the response), HTTP tracing, and panic recovery.
pub fn app(router: Router, env: Env) -> axum::Router {
    axum::Router::new()
        .fallback_service(KeyworkService::new(router, env))
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(RequestIdGenerator))
}

/// Serves `router` on the configured address until Ctrl+C or SIGTERM, then
/// drains in-flight requests for at most `shutdown_timeout`.
///
/// ```rust,no_run
/// use keywork::{Config, Env, Router, serve};
///
/// #[tokio::main]
/// async fn main() -> keywork::Result<()> {
///     let config = Config::default();
///     config.setup_tracing();
///
///     let router = Router::from_config(&config)?
///         .get("/", |_event: keywork::FetchEvent| async { Ok::<_, keywork::Error>("hello") });
///     serve(&config, router, Env::default()).await
/// }
/// ```
pub async fn serve(config: &Config, router: Router, env: Env) -> Result<()> {
    let listener = bind(config).await?;
    let notifier = ShutdownNotifier::default();
    run(listener, app(router, env), config.http.shutdown_timeout, notifier, termination_signal()).await
}

/// Like [`serve`], on an already bound listener, shutting down when `shutdown`
/// resolves instead of on a signal. Phases are reported through `notifier`.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    router: Router,
    env: Env,
    timeout: Duration,
    notifier: ShutdownNotifier,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    run(listener, app(router, env), timeout, notifier, shutdown).await
}

async fn bind(config: &Config) -> Result<TcpListener> {
    config.validate()?;
    let bind_addr = config.http.full_bind_addr();
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Bound, waiting for connections");
    Ok(listener)
}

async fn run<F>(
    listener: TcpListener,
    app: axum::Router,
    timeout: Duration,
    notifier: ShutdownNotifier,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut shutdown_rx = notifier.subscribe();
    let trigger = notifier.clone();
    let serve_future = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown.await;
        trigger.begin(timeout);
    });

    // The timeout only starts once shutdown has been initiated.
    tokio::select! {
        result = serve_future => {
            tracing::info!("Graceful shutdown completed");
            result?;
        }
        _ = async {
            loop {
                match shutdown_rx.recv().await {
                    Ok(ShutdownPhase::Initiated) => break,
                    Ok(_) => continue,
                    Err(_) => return,
                }
            }
            tokio::time::sleep(timeout).await;
        } => {
            tracing::warn!("Graceful shutdown timeout expired, forcing shutdown");
            notifier.emit(ShutdownPhase::GracePeriodEnded);
        }
    }

    Ok(())
}
