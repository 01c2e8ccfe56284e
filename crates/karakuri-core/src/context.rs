//! The live UI root that workflows observe and mutate.

use crate::error::DomError;
use std::fmt;
use std::sync::Arc;

/// Opaque handle to an element, issued by a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Creates a handle from a raw index.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A UI event dispatched on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    /// Event type, e.g. `submit`.
    pub kind: String,
    /// Whether the event propagates to ancestors.
    pub bubbles: bool,
}

impl DomEvent {
    /// Creates an event of the given kind.
    pub fn new(kind: impl Into<String>, bubbles: bool) -> Self {
        Self {
            kind: kind.into(),
            bubbles,
        }
    }

    /// A bubbling `submit` event.
    pub fn submit() -> Self {
        Self::new("submit", true)
    }
}

/// A file handed to the window for client-side download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDownload {
    /// Suggested file name, e.g. `export.csv`.
    pub file_name: String,
    /// MIME type of the contents.
    pub mime_type: String,
    /// File contents.
    pub contents: String,
}

/// Element lookup and mutation.
///
/// Selectors are passed through verbatim. Implementations report malformed
/// selectors as [`DomError::InvalidSelector`].
pub trait Document: Send + Sync {
    /// Returns the first element matching `selector`.
    fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, DomError>;

    /// Returns every element matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError>;

    /// Returns the first descendant of `scope` matching `selector`.
    fn query_selector_within(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>, DomError>;

    /// Returns an attribute of the element, if it is set.
    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, DomError>;

    /// Simulates a primary activation on the element.
    fn click(&self, node: NodeId) -> Result<(), DomError>;

    /// Assigns the value of an input-like element.
    fn set_value(&self, node: NodeId, value: &str) -> Result<(), DomError>;

    /// Replaces the text content of an element.
    fn set_text_content(&self, node: NodeId, text: &str) -> Result<(), DomError>;

    /// Replaces the inner HTML of an element.
    fn set_inner_html(&self, node: NodeId, html: &str) -> Result<(), DomError>;

    /// Dispatches an event on the element.
    fn dispatch_event(&self, node: NodeId, event: &DomEvent) -> Result<(), DomError>;
}

/// Location and download capabilities of the page.
pub trait Window: Send + Sync {
    /// Returns the absolute URL of the current location.
    fn href(&self) -> String;

    /// Replaces only the location fragment. No reload happens.
    fn set_location_hash(&self, hash: &str) -> Result<(), DomError>;

    /// Performs a full navigation to `href`.
    fn set_location_href(&self, href: &str) -> Result<(), DomError>;

    /// Offers a file to the user as a download.
    fn download(&self, file: &FileDownload) -> Result<(), DomError>;
}

/// The environment a workflow runs against.
///
/// Exactly one context flows through a whole run. Cloning is cheap and
/// shares the same underlying page.
#[derive(Clone)]
pub struct WorkflowContext {
    document: Arc<dyn Document>,
    window: Arc<dyn Window>,
}

impl fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowContext").finish_non_exhaustive()
    }
}

impl WorkflowContext {
    /// Creates a context from separate document and window handles.
    pub fn new(document: Arc<dyn Document>, window: Arc<dyn Window>) -> Self {
        Self { document, window }
    }

    /// Creates a context from a single page object acting as both.
    pub fn from_page<P>(page: Arc<P>) -> Self
    where
        P: Document + Window + 'static,
    {
        Self {
            document: page.clone(),
            window: page,
        }
    }

    /// Returns the document.
    pub fn document(&self) -> &dyn Document {
        self.document.as_ref()
    }

    /// Returns the window.
    pub fn window(&self) -> &dyn Window {
        self.window.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_event_bubbles() {
        let event = DomEvent::submit();
        assert_eq!(event.kind, "submit");
        assert!(event.bubbles);
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::new(7).to_string(), "#7");
        assert_eq!(NodeId::new(7).as_u64(), 7);
    }
}
