//! Feature component trait

use crate::error::RenderFault;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Rendered output of one feature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    /// Heading shown for the mount
    pub title: String,
    /// Structured body content
    pub body: Value,
}

impl Surface {
    /// Surface with a title and empty body
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: Value::Null,
        }
    }

    /// With body content
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

/// A loadable, renderable feature unit
///
/// `render` receives the resolved prop bag and produces a [`Surface`].
/// Implementations may fail with a [`RenderFault`]; a panic inside
/// `render` is contained at the host's isolation boundary and surfaces
/// as a fault too, so callers never observe it.
pub trait FeatureComponent: Send + Sync {
    /// Render the feature with the given props
    ///
    /// # Errors
    ///
    /// Returns a [`RenderFault`] when the component cannot produce a
    /// surface for the given props.
    fn render(&self, props: &Map<String, Value>) -> Result<Surface, RenderFault>;
}
