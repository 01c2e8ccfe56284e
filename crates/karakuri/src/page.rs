//! An in-memory UI root for headless runs.
//!
//! [`VirtualPage`] implements both [`Document`] and [`Window`], so a whole
//! workflow can run without a browser. It understands a small selector
//! language: compound selectors made of `tag`, `*`, `#id`, `.class`,
//! `[attr]` and `[attr=value]`, joined by descendant combinators.

use karakuri_core::{Document, DomError, DomEvent, FileDownload, NodeId, Window};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use url::Url;

/// Description of an element to append to a [`VirtualPage`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
}

impl Element {
    /// Creates an element with the given tag name.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Sets the `id` attribute.
    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.with_attr("id", id)
    }

    /// Adds a class to the `class` attribute.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        let classes = self.attributes.entry("class".to_string()).or_default();
        if !classes.is_empty() {
            classes.push(' ');
        }
        classes.push_str(&class);
        self
    }

    /// Sets an arbitrary attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets the initial text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// An event recorded by [`VirtualPage::dispatch_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedEvent {
    /// The element the event was dispatched on.
    pub target: NodeId,
    /// The event itself.
    pub event: DomEvent,
    /// Elements that saw the event, target first.
    pub path: Vec<NodeId>,
}

#[derive(Debug)]
struct Node {
    element: Element,
    parent: Option<usize>,
    value: String,
    inner_html: Option<String>,
    clicks: u32,
}

#[derive(Debug)]
struct PageState {
    nodes: Vec<Node>,
    location: Url,
    navigations: usize,
    events: Vec<DispatchedEvent>,
    downloads: Vec<FileDownload>,
}

/// An in-memory page.
#[derive(Debug)]
pub struct VirtualPage {
    state: Mutex<PageState>,
}

impl VirtualPage {
    /// Creates an empty page located at `url`.
    pub fn new(url: &str) -> Result<Self, DomError> {
        let location = Url::parse(url).map_err(|e| DomError::Navigation {
            target: url.to_string(),
            details: e.to_string(),
        })?;
        Ok(Self {
            state: Mutex::new(PageState {
                nodes: Vec::new(),
                location,
                navigations: 0,
                events: Vec::new(),
                downloads: Vec::new(),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an element under `parent`, or at the top level.
    pub fn append(&self, parent: Option<NodeId>, element: Element) -> Result<NodeId, DomError> {
        let mut state = self.state();
        let parent = match parent {
            Some(id) => Some(state.index(id)?),
            None => None,
        };
        let value = element.attributes.get("value").cloned().unwrap_or_default();
        state.nodes.push(Node {
            element,
            parent,
            value,
            inner_html: None,
            clicks: 0,
        });
        Ok(NodeId::new(state.nodes.len() as u64 - 1))
    }

    /// Returns the current value of an input-like element.
    pub fn value(&self, node: NodeId) -> Option<String> {
        let state = self.state();
        state.node(node).map(|n| n.value.clone())
    }

    /// Returns the text content of an element.
    pub fn text_content(&self, node: NodeId) -> Option<String> {
        let state = self.state();
        state.node(node).map(|n| n.element.text.clone())
    }

    /// Returns the inner HTML of an element, if it was ever assigned.
    pub fn inner_html(&self, node: NodeId) -> Option<String> {
        let state = self.state();
        state.node(node).and_then(|n| n.inner_html.clone())
    }

    /// Returns how many times an element was clicked.
    pub fn click_count(&self, node: NodeId) -> u32 {
        let state = self.state();
        state.node(node).map(|n| n.clicks).unwrap_or(0)
    }

    /// Returns the current location.
    pub fn location(&self) -> Url {
        self.state().location.clone()
    }

    /// Returns the number of full navigations performed.
    pub fn navigation_count(&self) -> usize {
        self.state().navigations
    }

    /// Returns every event dispatched so far, oldest first.
    pub fn events(&self) -> Vec<DispatchedEvent> {
        self.state().events.clone()
    }

    /// Returns every file offered for download so far.
    pub fn downloads(&self) -> Vec<FileDownload> {
        self.state().downloads.clone()
    }
}

impl PageState {
    fn index(&self, id: NodeId) -> Result<usize, DomError> {
        let index = id.as_u64() as usize;
        if index < self.nodes.len() {
            Ok(index)
        } else {
            Err(DomError::StaleNode(id))
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_u64() as usize)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes
            .get_mut(id.as_u64() as usize)
            .ok_or(DomError::StaleNode(id))
    }

    fn is_descendant(&self, index: usize, ancestor: usize) -> bool {
        let mut current = self.nodes[index].parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes[parent].parent;
        }
        false
    }

    fn matches(&self, index: usize, selector: &Selector) -> bool {
        let Some((last, ancestors)) = selector.parts.split_last() else {
            return false;
        };
        if !last.matches(&self.nodes[index].element) {
            return false;
        }
        let mut current = self.nodes[index].parent;
        for part in ancestors.iter().rev() {
            loop {
                match current {
                    Some(parent) => {
                        current = self.nodes[parent].parent;
                        if part.matches(&self.nodes[parent].element) {
                            break;
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }

    fn all_matches(&self, selector: &str, scope: Option<usize>) -> Result<Vec<NodeId>, DomError> {
        let selector = Selector::parse(selector)?;
        Ok((0..self.nodes.len())
            .filter(|&i| scope.map_or(true, |s| self.is_descendant(i, s)))
            .filter(|&i| self.matches(i, &selector))
            .map(|i| NodeId::new(i as u64))
            .collect())
    }

    fn first_match(&self, selector: &str, scope: Option<usize>) -> Result<Option<NodeId>, DomError> {
        Ok(self.all_matches(selector, scope)?.into_iter().next())
    }
}

impl Document for VirtualPage {
    fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, DomError> {
        self.state().first_match(selector, None)
    }

    fn query_selector_within(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>, DomError> {
        let state = self.state();
        let scope = state.index(scope)?;
        state.first_match(selector, Some(scope))
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
        self.state().all_matches(selector, None)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, DomError> {
        let state = self.state();
        let index = state.index(node)?;
        Ok(state.nodes[index].element.attributes.get(name).cloned())
    }

    fn click(&self, node: NodeId) -> Result<(), DomError> {
        self.state().node_mut(node)?.clicks += 1;
        Ok(())
    }

    fn set_value(&self, node: NodeId, value: &str) -> Result<(), DomError> {
        self.state().node_mut(node)?.value = value.to_string();
        Ok(())
    }

    fn set_text_content(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        let mut state = self.state();
        let node = state.node_mut(node)?;
        node.element.text = text.to_string();
        node.inner_html = None;
        Ok(())
    }

    fn set_inner_html(&self, node: NodeId, html: &str) -> Result<(), DomError> {
        self.state().node_mut(node)?.inner_html = Some(html.to_string());
        Ok(())
    }

    fn dispatch_event(&self, node: NodeId, event: &DomEvent) -> Result<(), DomError> {
        let mut state = self.state();
        let target = state.index(node)?;
        let mut path = vec![node];
        if event.bubbles {
            let mut current = state.nodes[target].parent;
            while let Some(parent) = current {
                path.push(NodeId::new(parent as u64));
                current = state.nodes[parent].parent;
            }
        }
        debug!(kind = %event.kind, target = %node, "Event dispatched");
        state.events.push(DispatchedEvent {
            target: node,
            event: event.clone(),
            path,
        });
        Ok(())
    }
}

impl Window for VirtualPage {
    fn href(&self) -> String {
        self.state().location.to_string()
    }

    fn set_location_hash(&self, hash: &str) -> Result<(), DomError> {
        let fragment = hash.strip_prefix('#').unwrap_or(hash);
        let mut state = self.state();
        state
            .location
            .set_fragment(if fragment.is_empty() { None } else { Some(fragment) });
        Ok(())
    }

    fn set_location_href(&self, href: &str) -> Result<(), DomError> {
        let mut state = self.state();
        let target = state.location.join(href).map_err(|e| DomError::Navigation {
            target: href.to_string(),
            details: e.to_string(),
        })?;
        state.location = target;
        state.navigations += 1;
        Ok(())
    }

    fn download(&self, file: &FileDownload) -> Result<(), DomError> {
        self.state().downloads.push(file.clone());
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttrMatch>,
}

impl Compound {
    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(&element.tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attributes.get("id") != Some(id) {
                return false;
            }
        }
        let classes: Vec<&str> = element
            .attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default();
        if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
            return false;
        }
        self.attributes
            .iter()
            .all(|attr| match (element.attributes.get(&attr.name), &attr.value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            })
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Selector {
    parts: Vec<Compound>,
}

impl Selector {
    fn parse(input: &str) -> Result<Self, DomError> {
        let invalid = || DomError::InvalidSelector(input.to_string());
        let mut cursor = Cursor {
            chars: input.chars().collect(),
            pos: 0,
        };
        let mut parts = Vec::new();
        loop {
            cursor.skip_whitespace();
            if cursor.at_end() {
                break;
            }
            parts.push(cursor.compound().ok_or_else(invalid)?);
            if !cursor.at_end() && !cursor.peek().is_some_and(char::is_whitespace) {
                return Err(invalid());
            }
        }
        if parts.is_empty() {
            return Err(invalid());
        }
        Ok(Self { parts })
    }
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.chars[start..self.pos].iter().collect())
    }

    fn attribute_value(&mut self) -> Option<String> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                let value = self.chars[start..self.pos].iter().collect();
                self.eat(quote).then_some(value)
            }
            _ => self.ident(),
        }
    }

    fn compound(&mut self) -> Option<Compound> {
        let start = self.pos;
        let mut compound = Compound::default();
        if !self.eat('*') {
            compound.tag = self.ident();
        }
        loop {
            if self.eat('#') {
                compound.id = Some(self.ident()?);
            } else if self.eat('.') {
                compound.classes.push(self.ident()?);
            } else if self.eat('[') {
                self.skip_whitespace();
                let name = self.ident()?;
                self.skip_whitespace();
                let value = if self.eat('=') {
                    self.skip_whitespace();
                    let value = self.attribute_value()?;
                    self.skip_whitespace();
                    Some(value)
                } else {
                    None
                };
                if !self.eat(']') {
                    return None;
                }
                compound.attributes.push(AttrMatch { name, value });
            } else {
                break;
            }
        }
        (self.pos > start).then_some(compound)
    }
}
