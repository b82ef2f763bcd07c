//!
//! Streaming server-side rendering.
//!
//! The response body is the read side of a [`PassThrough`]. Rendering runs on a
//! separate task that writes into it, so response headers leave immediately while
//! the body streams. A failed render cancels the body with an error item, which
//! truncates the response. A dropped body (client disconnect) cancels the render.
//!

use {
    super::{
        RenderOptions,
        element::Element,
        hydration::EmbeddedHydration,
        renderer::RenderOutput,
    },
    crate::{Error, EventInit, FetchEvent, Result, response::{ResponseOptions, build_stream_response}},
    axum::body::{Body, Bytes},
    futures::StreamExt,
    http::Response,
    serde_json::Value,
    std::panic::{AssertUnwindSafe, catch_unwind},
    tokio::sync::mpsc,
    tracing::Instrument,
};

/// Context key under which components find the page's static props.
pub const STATIC_PROPS_CONTEXT: &str = "keywork.static_props";

const CHANNEL_CAPACITY: usize = 16;

/// Writable side of a streaming response body.
pub struct PassThrough {
    tx: mpsc::Sender<Result<Bytes>>,
}

impl PassThrough {
    /// Creates a pass-through and the [`Body`] that reads from it.
    pub fn new() -> (Self, Body) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        (Self { tx }, Body::from_stream(stream))
    }

    /// Writes a chunk. Returns `false` once the reader is gone.
    pub async fn write(&self, chunk: Bytes) -> bool {
        self.tx.send(Ok(chunk)).await.is_ok()
    }

    /// Cancels the readable side. The body ends with an error and the response is
    /// truncated.
    pub async fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(reason = %reason, "Cancelling streamed response");
        let _ = self.tx.send(Err(Error::internal(reason))).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Renders `page` inside the document and providers and streams it into `pass`.
///
/// The tree handed to the renderer is
/// `document(providers(context(static props, [page, hydration script])))`.
/// Never fails: setup errors, panics and render errors all become a cancellation.
pub async fn render_to_stream(
    pass: PassThrough,
    page: Element,
    options: &RenderOptions,
    static_props: Value,
    event_init: &EventInit,
) {
    let hydration = match EmbeddedHydration::new(&static_props, event_init) {
        Ok(hydration) => hydration,
        Err(err) => {
            pass.cancel(format!("Failed to encode hydration payload: {err}"))
                .await;
            return;
        }
    };

    // Composing the tree runs user code, so it shares the renderer's guard.
    let setup = catch_unwind(AssertUnwindSafe(|| {
        let tree = (options.document)((options.providers)(Element::context(
            STATIC_PROPS_CONTEXT,
            static_props,
            Element::fragment([page, hydration.element()]),
        )));
        options.renderer.render(tree)
    }));

    let output = match setup {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            pass.cancel(format!("Renderer failed to start: {err}")).await;
            return;
        }
        Err(_) => {
            pass.cancel("Render setup panicked").await;
            return;
        }
    };

    let RenderOutput {
        mut stream,
        error,
        controller,
    } = output;

    if let Some(err) = error {
        if let Some(controller) = &controller {
            controller.cancel();
        }
        pass.cancel(format!("Render failed: {err}")).await;
        return;
    }

    loop {
        tokio::select! {
            _ = pass.tx.closed() => {
                tracing::debug!("Response body dropped, aborting render");
                if let Some(controller) = &controller {
                    controller.cancel();
                }
                return;
            }
            item = stream.next() => match item {
                Some(Ok(chunk)) => {
                    if !pass.write(chunk).await {
                        if let Some(controller) = &controller {
                            controller.cancel();
                        }
                        return;
                    }
                }
                Some(Err(err)) => {
                    if let Some(controller) = &controller {
                        controller.cancel();
                    }
                    pass.cancel(format!("Render failed mid-stream: {err}")).await;
                    return;
                }
                None => return,
            }
        }
    }
}

/// Starts rendering `page` on a new task and returns the streaming HTML response.
///
/// Static props come from [`super::StaticProps`] attached to the event, falling back
/// to [`RenderOptions::static_props`] and then to `null`.
pub fn render_response(
    event: &FetchEvent,
    page: Element,
    options: &RenderOptions,
) -> Result<Response<Body>> {
    let static_props = event
        .data::<super::StaticProps>()
        .map(|props| props.0)
        .or_else(|| options.static_props.clone())
        .unwrap_or(Value::Null);
    let event_init = event.event_init();
    let options = options.clone();
    let (pass, body) = PassThrough::new();

    tokio::spawn(
        async move {
            render_to_stream(pass, page, &options, static_props, &event_init).await;
        }
        .instrument(tracing::Span::current()),
    );

    build_stream_response(body, ResponseOptions::html())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Env,
        ssr::{MemoryScope, Renderer, extract_hydration, hydration_element_id},
    };
    use http::Request;
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };
    use tokio_util::sync::CancellationToken;

    fn event() -> FetchEvent {
        FetchEvent::new(
            Request::builder()
                .uri("https://example.com/page")
                .body(Body::empty())
                .unwrap(),
            Env::default(),
        )
        .unwrap()
    }

    async fn read_body(body: Body) -> std::result::Result<String, axum::Error> {
        let bytes = body.collect().await?.to_bytes();
        Ok(String::from_utf8(bytes.to_vec()).unwrap())
    }

    struct FailingSetup;
    impl Renderer for FailingSetup {
        fn render(&self, _: Element) -> Result<RenderOutput> {
            Err(Error::internal("no renderer available"))
        }
    }

    struct PanickingRenderer;
    impl Renderer for PanickingRenderer {
        fn render(&self, _: Element) -> Result<RenderOutput> {
            panic!("renderer exploded")
        }
    }

    /// Streams forever until its controller is cancelled.
    struct EndlessRenderer {
        cancelled: Arc<AtomicBool>,
    }
    impl Renderer for EndlessRenderer {
        fn render(&self, _: Element) -> Result<RenderOutput> {
            let controller = CancellationToken::new();
            let watcher = controller.clone();
            let cancelled = Arc::clone(&self.cancelled);
            tokio::spawn(async move {
                watcher.cancelled().await;
                cancelled.store(true, Ordering::SeqCst);
            });
            let stream = futures::stream::repeat_with(|| Ok(Bytes::from_static(b"<p></p>")))
                .then(|chunk| async move {
                    tokio::task::yield_now().await;
                    chunk
                })
                .boxed();
            Ok(RenderOutput {
                stream,
                error: None,
                controller: Some(controller),
            })
        }
    }

    /// Emits one chunk, then fails while its controller is still live.
    struct MidStreamFailure {
        cancelled: Arc<AtomicBool>,
    }
    impl Renderer for MidStreamFailure {
        fn render(&self, _: Element) -> Result<RenderOutput> {
            let controller = CancellationToken::new();
            let watcher = controller.clone();
            let cancelled = Arc::clone(&self.cancelled);
            tokio::spawn(async move {
                watcher.cancelled().await;
                cancelled.store(true, Ordering::SeqCst);
            });
            let stream = futures::stream::iter([
                Ok(Bytes::from_static(b"<p>partial")),
                Err(Error::internal("component failed")),
            ])
            .boxed();
            Ok(RenderOutput {
                stream,
                error: None,
                controller: Some(controller),
            })
        }
    }

    async fn wait_for(flag: &AtomicBool) -> bool {
        for _ in 0..100 {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        flag.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_render_composes_document_and_hydration() {
        let event = event();
        let page = Element::component(|scope| {
            let title = scope
                .get(STATIC_PROPS_CONTEXT)
                .and_then(|props| props["title"].as_str())
                .unwrap_or_default()
                .to_string();
            Ok(Element::node("h1").child(Element::text(title)))
        });
        let options = RenderOptions::default().with_static_props(json!({"title": "Todos"}));

        let response = render_response(&event, page, &options).unwrap();
        assert_eq!(response.headers()["content-type"], "text/html; charset=utf-8");

        let html = read_body(response.into_body()).await.unwrap();
        assert!(html.starts_with("<!DOCTYPE html><html>"));
        assert!(html.contains("<h1>Todos</h1>"));
        let h1 = html.find("<h1>").unwrap();
        let script = html.find(hydration_element_id()).unwrap();
        assert!(script > h1, "hydration script follows the page");

        let embedded = EmbeddedHydration::from_html(&html).unwrap();
        let mut scope = MemoryScope::new();
        embedded.install(&mut scope);
        let payload = extract_hydration(&mut scope).unwrap();
        assert_eq!(payload.static_props, json!({"title": "Todos"}));
        assert_eq!(payload.event_init.url, "https://example.com/page");
    }

    #[tokio::test]
    async fn test_event_static_props_take_precedence() {
        let event = event();
        event.insert_data(crate::ssr::StaticProps(json!({"from": "event"})));
        let options = RenderOptions::default().with_static_props(json!({"from": "options"}));
        let response = render_response(&event, Element::text("x"), &options).unwrap();
        let html = read_body(response.into_body()).await.unwrap();
        let embedded = EmbeddedHydration::from_html(&html).unwrap();
        let mut scope = MemoryScope::new();
        embedded.install(&mut scope);
        assert_eq!(
            extract_hydration(&mut scope).unwrap().static_props,
            json!({"from": "event"})
        );
    }

    #[tokio::test]
    async fn test_render_error_cancels_body() {
        let response = render_response(
            &event(),
            Element::node("not a tag"),
            &RenderOptions::default(),
        )
        .unwrap();
        assert!(read_body(response.into_body()).await.is_err());
    }

    #[tokio::test]
    async fn test_setup_failure_cancels_body() {
        let options = RenderOptions::default().with_renderer(FailingSetup);
        let response = render_response(&event(), Element::text("x"), &options).unwrap();
        assert!(read_body(response.into_body()).await.is_err());
    }

    #[tokio::test]
    async fn test_renderer_panic_cancels_body() {
        let options = RenderOptions::default().with_renderer(PanickingRenderer);
        let response = render_response(&event(), Element::text("x"), &options).unwrap();
        assert!(read_body(response.into_body()).await.is_err());
    }

    #[tokio::test]
    async fn test_document_panic_cancels_body() {
        let options = RenderOptions::default().with_document(|_| panic!("document exploded"));
        let response = render_response(&event(), Element::text("hi"), &options).unwrap();
        assert!(read_body(response.into_body()).await.is_err());
    }

    #[tokio::test]
    async fn test_providers_panic_cancels_body() {
        let options = RenderOptions::default().with_providers(|_| panic!("providers exploded"));
        let response = render_response(&event(), Element::text("hi"), &options).unwrap();
        assert!(read_body(response.into_body()).await.is_err());
    }

    #[tokio::test]
    async fn test_mid_stream_error_aborts_render() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let options = RenderOptions::default().with_renderer(MidStreamFailure {
            cancelled: Arc::clone(&cancelled),
        });
        let response = render_response(&event(), Element::text("x"), &options).unwrap();
        assert!(read_body(response.into_body()).await.is_err());
        assert!(wait_for(&cancelled).await);
    }

    #[tokio::test]
    async fn test_dropped_body_aborts_render() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let options = RenderOptions::default().with_renderer(EndlessRenderer {
            cancelled: Arc::clone(&cancelled),
        });
        let response = render_response(&event(), Element::text("x"), &options).unwrap();

        let mut body = response.into_body();
        let first = body.frame().await.unwrap().unwrap();
        assert!(first.is_data());
        drop(body);

        assert!(wait_for(&cancelled).await);
    }
}
