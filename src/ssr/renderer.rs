//!
//! The rendering capability and the built-in HTML renderer.
//!

use {
    super::element::{Element, RenderScope, escape_attr, escape_text},
    crate::{Error, Result},
    axum::body::Bytes,
    futures::{StreamExt, stream::BoxStream},
    tokio_util::sync::CancellationToken,
};

/// What a [`Renderer`] hands back.
///
/// Render-time failures are reported through `error`, never by returning `Err`
/// from [`Renderer::render`]; an `Err` is reserved for setup failures. The
/// `controller`, when present, aborts the render once cancelled.
pub struct RenderOutput {
    pub stream: BoxStream<'static, Result<Bytes>>,
    pub error: Option<Error>,
    pub controller: Option<CancellationToken>,
}

impl RenderOutput {
    /// An output that failed before producing anything.
    pub fn failed(error: Error) -> Self {
        Self {
            stream: futures::stream::empty().boxed(),
            error: Some(error),
            controller: None,
        }
    }
}

/// Turns an element tree into a byte stream.
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, element: Element) -> Result<RenderOutput>;
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Serializes elements to HTML, emitting the output in chunks of roughly
/// `chunk_size` bytes split at element boundaries.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    chunk_size: usize,
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self { chunk_size: 8 * 1024 }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Renders the whole tree into a string. Convenient for tests and static pages.
    pub fn render_to_string(&self, element: &Element) -> Result<String> {
        let mut writer = ChunkWriter::new(usize::MAX);
        writer.write(element, &RenderScope::default())?;
        Ok(writer.buffer)
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, element: Element) -> Result<RenderOutput> {
        let controller = CancellationToken::new();
        let mut writer = ChunkWriter::new(self.chunk_size);
        if let Err(error) = writer.write(&element, &RenderScope::default()) {
            return Ok(RenderOutput {
                controller: Some(controller),
                ..RenderOutput::failed(error)
            });
        }

        let stream = futures::stream::iter(writer.finish().into_iter().map(Ok))
            .take_until(controller.clone().cancelled_owned())
            .boxed();
        Ok(RenderOutput {
            stream,
            error: None,
            controller: Some(controller),
        })
    }
}

struct ChunkWriter {
    chunk_size: usize,
    buffer: String,
    chunks: Vec<Bytes>,
}

impl ChunkWriter {
    fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            buffer: String::new(),
            chunks: Vec::new(),
        }
    }

    fn write(&mut self, element: &Element, scope: &RenderScope) -> Result<()> {
        match element {
            Element::Node {
                tag,
                attrs,
                children,
            } => {
                if !is_valid_tag(tag) {
                    return Err(Error::usage(format!("Invalid element tag name `{tag}`")));
                }
                self.buffer.push('<');
                self.buffer.push_str(tag);
                for (name, value) in attrs {
                    if !is_valid_attr(name) {
                        return Err(Error::usage(format!(
                            "Invalid attribute name `{name}` on <{tag}>"
                        )));
                    }
                    self.buffer.push(' ');
                    self.buffer.push_str(name);
                    self.buffer.push_str("=\"");
                    escape_attr(value, &mut self.buffer);
                    self.buffer.push('"');
                }
                self.buffer.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return Ok(());
                }
                for child in children {
                    self.write(child, scope)?;
                }
                self.buffer.push_str("</");
                self.buffer.push_str(tag);
                self.buffer.push('>');
                self.maybe_flush();
            }
            Element::Text(text) => escape_text(text, &mut self.buffer),
            Element::Raw(html) => self.buffer.push_str(html),
            Element::Fragment(children) => {
                for child in children {
                    self.write(child, scope)?;
                }
            }
            Element::Context { key, value, child } => {
                self.write(child, &scope.with(key, value))?;
            }
            Element::Component(component) => {
                let rendered = component.render(scope)?;
                self.write(&rendered, scope)?;
            }
        }
        Ok(())
    }

    fn maybe_flush(&mut self) {
        if self.buffer.len() >= self.chunk_size {
            let chunk = std::mem::take(&mut self.buffer);
            self.chunks.push(Bytes::from(chunk));
        }
    }

    fn finish(mut self) -> Vec<Bytes> {
        if !self.buffer.is_empty() {
            self.chunks.push(Bytes::from(self.buffer));
        }
        self.chunks
    }
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_valid_attr(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control() && !matches!(c, '"' | '\'' | '>' | '/' | '='))
}
