//!
//! Server-side rendering of UI elements.
//!
//! - [`Element`] is the UI element tree handlers return.
//! - [`Renderer`] is the rendering capability. [`HtmlRenderer`] is the built-in one.
//! - [`render_response`] streams a rendered page as an HTML response.
//! - The hydration submodule embeds the data the client needs to pick up where the
//!   server left off.
//!

mod element;
mod hydration;
mod renderer;
mod stream;

pub use element::*;
pub use hydration::*;
pub use renderer::*;
pub use stream::*;

use {serde_json::Value, std::sync::Arc};

/// Static props for the page being rendered, attached to the event by a handler or
/// middleware with [`crate::FetchEvent::insert_data`].
#[derive(Debug, Clone)]
pub struct StaticProps(pub Value);

/// Everything needed to turn an [`Element`] into a response.
#[derive(Clone)]
pub struct RenderOptions {
    pub renderer: Arc<dyn Renderer>,
    pub document: DocumentComponent,
    pub providers: ProvidersComponent,
    /// Static props used when the event carries none.
    pub static_props: Option<Value>,
}

impl RenderOptions {
    pub fn with_renderer(mut self, renderer: impl Renderer) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    pub fn with_document<F>(mut self, document: F) -> Self
    where
        F: Fn(Element) -> Element + Send + Sync + 'static,
    {
        self.document = Arc::new(document);
        self
    }

    pub fn with_providers<F>(mut self, providers: F) -> Self
    where
        F: Fn(Element) -> Element + Send + Sync + 'static,
    {
        self.providers = Arc::new(providers);
        self
    }

    pub fn with_static_props(mut self, static_props: Value) -> Self {
        self.static_props = Some(static_props);
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            renderer: Arc::new(HtmlRenderer::new()),
            document: default_document(),
            providers: identity_providers(),
            static_props: None,
        }
    }
}

impl std::fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderOptions")
            .field("static_props", &self.static_props)
            .finish_non_exhaustive()
    }
}
