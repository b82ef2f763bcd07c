//!
//! An owned UI element tree.
//!

use {
    crate::Result,
    serde_json::Value,
    std::{collections::HashMap, fmt, sync::Arc},
};

/// Context values visible to components while rendering.
#[derive(Debug, Clone, Default)]
pub struct RenderScope {
    values: HashMap<String, Value>,
}

impl RenderScope {
    /// Returns the innermost value provided under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub(crate) fn with(&self, key: &str, value: &Value) -> Self {
        let mut scope = self.clone();
        scope.values.insert(key.to_string(), value.clone());
        scope
    }
}

type ComponentFn = dyn Fn(&RenderScope) -> Result<Element> + Send + Sync;

/// A function component, evaluated at render time with the current [`RenderScope`].
#[derive(Clone)]
pub struct Component(Arc<ComponentFn>);

impl Component {
    pub fn render(&self, scope: &RenderScope) -> Result<Element> {
        (self.0)(scope)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Component")
    }
}

/// A UI element.
#[derive(Debug, Clone)]
pub enum Element {
    Node {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<Element>,
    },
    /// Escaped text.
    Text(String),
    /// Markup emitted verbatim.
    Raw(String),
    Fragment(Vec<Element>),
    /// Provides `value` under `key` to every component below it.
    Context {
        key: String,
        value: Value,
        child: Box<Element>,
    },
    Component(Component),
}

impl Element {
    pub fn node(tag: impl Into<String>) -> Self {
        Element::Node {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Element::Text(text.into())
    }

    pub fn raw(html: impl Into<String>) -> Self {
        Element::Raw(html.into())
    }

    pub fn fragment(children: impl IntoIterator<Item = Element>) -> Self {
        Element::Fragment(children.into_iter().collect())
    }

    pub fn context(key: impl Into<String>, value: Value, child: Element) -> Self {
        Element::Context {
            key: key.into(),
            value,
            child: Box::new(child),
        }
    }

    pub fn component<F>(render: F) -> Self
    where
        F: Fn(&RenderScope) -> Result<Element> + Send + Sync + 'static,
    {
        Element::Component(Component(Arc::new(render)))
    }

    /// Adds an attribute. No effect on anything but a node.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Element::Node { attrs, .. } = &mut self {
            attrs.push((name.into(), value.into()));
        }
        self
    }

    /// Appends a child. On a fragment the child is appended to the fragment.
    pub fn child(mut self, element: Element) -> Self {
        match &mut self {
            Element::Node { children, .. } | Element::Fragment(children) => children.push(element),
            _ => {}
        }
        self
    }

    pub fn children(self, elements: impl IntoIterator<Item = Element>) -> Self {
        elements.into_iter().fold(self, Element::child)
    }
}

impl From<&str> for Element {
    fn from(text: &str) -> Self {
        Element::text(text)
    }
}

impl From<String> for Element {
    fn from(text: String) -> Self {
        Element::Text(text)
    }
}

/// Wraps the page in the outer HTML document.
pub type DocumentComponent = Arc<dyn Fn(Element) -> Element + Send + Sync>;

/// Wraps the page in application-wide providers.
pub type ProvidersComponent = Arc<dyn Fn(Element) -> Element + Send + Sync>;

/// A minimal document: doctype, `<html>`, an empty `<head>` with a charset, and the
/// page as the body's content.
pub fn default_document() -> DocumentComponent {
    Arc::new(|page| {
        Element::fragment([
            Element::raw("<!DOCTYPE html>"),
            Element::node("html").children([
                Element::node("head").child(Element::node("meta").attr("charset", "utf-8")),
                Element::node("body").child(page),
            ]),
        ])
    })
}

/// Providers that add nothing.
pub fn identity_providers() -> ProvidersComponent {
    Arc::new(|page| page)
}

pub(crate) fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

pub(crate) fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let element = Element::node("ul")
            .attr("class", "todos")
            .children(["a", "b"].map(|t| Element::node("li").child(t.into())));
        match element {
            Element::Node { tag, attrs, children } => {
                assert_eq!(tag, "ul");
                assert_eq!(attrs, vec![("class".to_string(), "todos".to_string())]);
                assert_eq!(children.len(), 2);
            }
            other => panic!("unexpected element {other:?}"),
        }
    }

    #[test]
    fn test_escaping() {
        let mut out = String::new();
        escape_text("<b>&</b>", &mut out);
        assert_eq!(out, "&lt;b&gt;&amp;&lt;/b&gt;");

        let mut out = String::new();
        escape_attr(r#"a"b"#, &mut out);
        assert_eq!(out, "a&quot;b");
    }

    #[test]
    fn test_scope_shadowing() {
        let outer = RenderScope::default().with("k", &Value::from(1));
        let inner = outer.with("k", &Value::from(2));
        assert_eq!(outer.get("k"), Some(&Value::from(1)));
        assert_eq!(inner.get("k"), Some(&Value::from(2)));
    }
}
