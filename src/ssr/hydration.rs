//!
//! Hydration payload embedding and extraction.
//!
//! The server renders one inline script under a reserved element id. When it runs
//! in the browser it stores two URL-encoded JSON strings under reserved global
//! keys and removes its own element. The client side reads both keys exactly once
//! and clears them.
//!

use {
    super::element::Element,
    crate::{Error, EventInit, Result},
    http::StatusCode,
    serde_json::Value,
    std::{collections::HashMap, sync::LazyLock},
    uuid::Uuid,
};

static HYDRATION_ELEMENT_ID: LazyLock<String> =
    LazyLock::new(|| format!("__keywork_hydration_{}", Uuid::new_v4().simple()));

/// Element id of the inline hydration script.
///
/// Random per process, so page markup cannot collide with or target it. Only the
/// global keys below are part of the client contract.
pub fn hydration_element_id() -> &'static str {
    &HYDRATION_ELEMENT_ID
}
/// Global key holding the static props.
pub const STATIC_PROPS_KEY: &str = "__KEYWORK_STATIC_PROPS__";
/// Global key holding the event init.
pub const EVENT_INIT_KEY: &str = "__KEYWORK_EVENT_INIT__";

/// The client-side global object the hydration script writes to.
pub trait GlobalScope {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str) -> Option<String>;
}

/// An in-memory [`GlobalScope`].
#[derive(Debug, Clone, Default)]
pub struct MemoryScope {
    values: HashMap<String, String>,
}

impl MemoryScope {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GlobalScope for MemoryScope {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }
}

/// The encoded hydration payload as it appears in the rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedHydration {
    static_props: String,
    event_init: String,
}

impl EmbeddedHydration {
    /// Encodes the payload. `Value::Null` static props signal "no props".
    pub fn new(static_props: &Value, event_init: &EventInit) -> Result<Self> {
        Ok(Self {
            static_props: urlencoding::encode(&serde_json::to_string(static_props)?).into_owned(),
            event_init: urlencoding::encode(&serde_json::to_string(event_init)?).into_owned(),
        })
    }

    /// The inline script body.
    pub fn script(&self) -> String {
        format!(
            r#"window["{STATIC_PROPS_KEY}"]="{}";window["{EVENT_INIT_KEY}"]="{}";document.getElementById("{}").remove();"#,
            self.static_props,
            self.event_init,
            hydration_element_id()
        )
    }

    /// The `<script>` element to render after the page.
    pub fn element(&self) -> Element {
        Element::node("script")
            .attr("id", hydration_element_id())
            .child(Element::raw(self.script()))
    }

    /// Does what the inline script does in a browser.
    pub fn install(&self, scope: &mut impl GlobalScope) {
        scope.set(STATIC_PROPS_KEY, self.static_props.clone());
        scope.set(EVENT_INIT_KEY, self.event_init.clone());
    }

    /// Recovers the payload from rendered markup.
    pub fn from_html(html: &str) -> Option<Self> {
        let start = html.find(&format!(r#"id="{}""#, hydration_element_id()))?;
        let rest = &html[start..];
        let script = &rest[..rest.find("</script>")?];
        Some(Self {
            static_props: read_assignment(script, STATIC_PROPS_KEY)?,
            event_init: read_assignment(script, EVENT_INIT_KEY)?,
        })
    }
}

fn read_assignment(script: &str, key: &str) -> Option<String> {
    let marker = format!(r#"window["{key}"]=""#);
    let start = script.find(&marker)? + marker.len();
    let len = script[start..].find('"')?;
    Some(script[start..start + len].to_string())
}

/// The decoded hydration payload.
#[derive(Debug, Clone, PartialEq)]
pub struct HydrationPayload {
    /// `Value::Null` when the page has no static props.
    pub static_props: Value,
    pub event_init: EventInit,
}

/// Reads and clears the hydration keys from `scope`.
///
/// Fails with a resource error when either key is absent, or when the static props
/// are `undefined` rather than an explicit `null`.
pub fn extract_hydration(scope: &mut impl GlobalScope) -> Result<HydrationPayload> {
    let static_props = scope.remove(STATIC_PROPS_KEY);
    let event_init = scope.remove(EVENT_INIT_KEY);

    let static_props = static_props.ok_or_else(|| missing_key(STATIC_PROPS_KEY))?;
    let event_init = event_init.ok_or_else(|| missing_key(EVENT_INIT_KEY))?;

    let static_props = decode(&static_props, STATIC_PROPS_KEY)?;
    if static_props == "undefined" {
        return Err(hydration_error(format!(
            "`{STATIC_PROPS_KEY}` is undefined. Static props must be an object or an explicit null"
        )));
    }
    let event_init = decode(&event_init, EVENT_INIT_KEY)?;

    Ok(HydrationPayload {
        static_props: serde_json::from_str(&static_props).map_err(|err| {
            hydration_error(format!("`{STATIC_PROPS_KEY}` is not valid JSON: {err}"))
        })?,
        event_init: serde_json::from_str(&event_init).map_err(|err| {
            hydration_error(format!("`{EVENT_INIT_KEY}` is not valid JSON: {err}"))
        })?,
    })
}

fn decode(value: &str, key: &str) -> Result<String> {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| hydration_error(format!("`{key}` is not valid URL-encoded UTF-8")))
}

fn missing_key(key: &str) -> Error {
    hydration_error(format!(
        "Embedded hydration key `{key}` is missing. Was this page rendered by the server?"
    ))
}

fn hydration_error(message: String) -> Error {
    Error::resource(StatusCode::INTERNAL_SERVER_ERROR, message)
}
