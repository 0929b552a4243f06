//! In-memory XHTML host document
//!
//! An arena-backed node tree built with quick-xml. It offers both search
//! capabilities the matcher understands: a built-in find over the rendered
//! text (selections may span nodes) and a text-node walk. Markers are real
//! `<mark>` elements spliced into the tree, so `to_html` returns the marked
//! document.
//!
//! Parsing is lenient enough for typical HTML served as XHTML: void elements
//! need not be closed, mismatched end tags are tolerated and HTML entities are
//! decoded.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tokio::sync::watch;

use super::error::{DocumentError, ObserverError, Result, WrapError};
use super::traits::HostDocument;
use super::types::{
    Capabilities, FindOptions, Marker, MarkerId, MutationFeed, NodeId, ScrollTarget, TextPoint,
    TextRange,
};
use crate::snippet::{find_ignore_case, same_quote};

/// Elements that never have content
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements that start a new line of rendered text
const LINE_BREAK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Stands in for a line break in the searchable text; never mapped to a node
const LINE_SEPARATOR: char = '\n';

/// Elements whose text cannot host a marker element
const UNSPLITTABLE_ELEMENTS: &[&str] = &["option", "script", "style", "textarea", "title"];

/// Configuration for marker elements
#[derive(Debug, Clone)]
pub struct MarkerConfig {
    /// Element name used for markers
    pub tag: String,
    /// CSS class applied to markers
    pub class_name: String,
    /// Data attribute carrying the marker ID
    pub id_attribute: String,
    /// Inline style, if any
    pub inline_style: Option<String>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            tag: "mark".to_string(),
            class_name: "snip-anchor".to_string(),
            id_attribute: "data-snip-marker".to_string(),
            inline_style: Some(
                "background-color: yellow; padding: 2px; border-radius: 3px; font-weight: bold;"
                    .to_string(),
            ),
        }
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Root,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    /// Comments and doctype, written back verbatim
    Raw(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct MarkerRecord {
    marker: Marker,
    label: String,
}

/// Text node slice of the concatenated document text
struct Segment {
    node: NodeId,
    start: usize,
    end: usize,
}

/// Mutable XHTML document tree
#[derive(Debug)]
pub struct XhtmlDocument {
    nodes: Vec<Node>,
    markers: Vec<MarkerRecord>,
    next_marker: u64,
    selection: Option<TextRange>,
    capabilities: Capabilities,
    marker_config: MarkerConfig,
    /// `None` when mutation observation is unavailable
    mutations: Option<watch::Sender<u64>>,
    scrolls: Vec<ScrollTarget>,
}

impl XhtmlDocument {
    const ROOT: NodeId = NodeId(0);

    /// Create an empty document
    pub fn new() -> Self {
        let (mutations, _) = watch::channel(0);
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            markers: Vec::new(),
            next_marker: 1,
            selection: None,
            capabilities: Capabilities::FULL,
            marker_config: MarkerConfig::default(),
            mutations: Some(mutations),
            scrolls: Vec::new(),
        }
    }

    /// Parse a document from markup
    pub fn parse(source: &str) -> Result<Self> {
        let mut doc = Self::new();
        doc.parse_into(source, Self::ROOT)?;
        Ok(doc)
    }

    /// Restrict the search facilities this document advertises
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Use a custom marker element configuration
    pub fn with_marker_config(mut self, config: MarkerConfig) -> Self {
        self.marker_config = config;
        self
    }

    /// Behave like a restricted context where mutations cannot be observed
    pub fn without_observer(mut self) -> Self {
        self.mutations = None;
        self
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Append parsed markup to the end of the body (late-loading content)
    pub fn append_html(&mut self, fragment: &str) -> Result<()> {
        let target = self.content_root();
        self.parse_into(fragment, target)?;
        self.notify_mutation();
        Ok(())
    }

    /// Replace the text of a text node
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<()> {
        match self.nodes.get_mut(node.0).map(|n| &mut n.kind) {
            Some(NodeKind::Text(existing)) => {
                *existing = text.to_string();
            }
            _ => return Err(DocumentError::InvalidNode(node.0)),
        }
        self.notify_mutation();
        Ok(())
    }

    fn notify_mutation(&self) {
        if let Some(tx) = &self.mutations {
            tx.send_modify(|generation| *generation += 1);
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Serialize the document
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for child in &self.nodes[Self::ROOT.0].children {
            self.write_node(*child, &mut out);
        }
        out
    }

    /// Concatenated text of the content root
    pub fn text_content(&self) -> String {
        self.text_nodes()
            .into_iter()
            .filter_map(|id| self.node_text(id))
            .collect()
    }

    /// All live markers in creation order
    pub fn markers(&self) -> Vec<Marker> {
        self.markers.iter().map(|r| r.marker.clone()).collect()
    }

    /// Scroll requests received so far
    pub fn scrolls(&self) -> &[ScrollTarget] {
        &self.scrolls
    }

    /// Current find selection
    pub fn selection(&self) -> Option<TextRange> {
        self.selection
    }

    // ========================================================================
    // Parsing
    // ========================================================================

    fn parse_into(&mut self, source: &str, parent: NodeId) -> Result<()> {
        let mut reader = Reader::from_str(source);
        reader.check_end_names(false);

        let mut stack = vec![parent];

        loop {
            let current = *stack.last().unwrap_or(&parent);
            match reader.read_event()? {
                Event::Start(e) => {
                    let (name, attributes) = element_parts(&e)?;
                    let is_void = VOID_ELEMENTS.contains(&name.as_str());
                    let id = self.push_node(current, NodeKind::Element { name, attributes });
                    if !is_void {
                        stack.push(id);
                    }
                }
                Event::Empty(e) => {
                    let (name, attributes) = element_parts(&e)?;
                    self.push_node(current, NodeKind::Element { name, attributes });
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                    // Close the nearest open element with this name; stray end tags are ignored
                    if let Some(pos) = stack
                        .iter()
                        .rposition(|id| self.element_name(*id) == Some(name.as_str()))
                    {
                        if pos > 0 {
                            stack.truncate(pos);
                        }
                    }
                }
                Event::Text(t) => {
                    let raw = String::from_utf8_lossy(&t);
                    let text = html_escape::decode_html_entities(&raw).into_owned();
                    if !text.is_empty() {
                        self.push_node(current, NodeKind::Text(text));
                    }
                }
                Event::CData(c) => {
                    let text = String::from_utf8_lossy(&c).into_owned();
                    self.push_node(current, NodeKind::Text(text));
                }
                Event::Comment(c) => {
                    let raw = format!("<!--{}-->", String::from_utf8_lossy(&c));
                    self.push_node(current, NodeKind::Raw(raw));
                }
                Event::DocType(d) => {
                    let raw = format!("<!DOCTYPE {}>", String::from_utf8_lossy(&d));
                    self.push_node(current, NodeKind::Raw(raw));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(())
    }

    fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    /// `<body>` if present, otherwise the document root
    fn content_root(&self) -> NodeId {
        self.nodes
            .iter()
            .position(|n| matches!(&n.kind, NodeKind::Element { name, .. } if name == "body"))
            .map(NodeId)
            .unwrap_or(Self::ROOT)
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Root => {
                for child in &node.children {
                    self.write_node(*child, out);
                }
            }
            NodeKind::Element { name, attributes } => {
                out.push('<');
                out.push_str(name);
                for (key, value) in attributes {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                if node.children.is_empty() && VOID_ELEMENTS.contains(&name.as_str()) {
                    out.push_str(" />");
                    return;
                }
                out.push('>');
                for child in &node.children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeKind::Raw(raw) => out.push_str(raw),
        }
    }

    // ========================================================================
    // Text geometry
    // ========================================================================

    fn collect_text_nodes(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Text(text) if !text.is_empty() => out.push(id),
            _ => {
                for child in &node.children {
                    self.collect_text_nodes(*child, out);
                }
            }
        }
    }

    /// Searchable text and the slice each text node occupies in it
    ///
    /// Line breaks and block boundaries become a separator that belongs to
    /// no node, so a match can never join text from both sides of one.
    fn segments(&self) -> (String, Vec<Segment>) {
        let mut text = String::new();
        let mut segments = Vec::new();
        self.collect_segments(self.content_root(), &mut text, &mut segments);
        (text, segments)
    }

    fn collect_segments(&self, id: NodeId, text: &mut String, segments: &mut Vec<Segment>) {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Text(value) => {
                if !value.is_empty() {
                    let start = text.len();
                    text.push_str(value);
                    segments.push(Segment {
                        node: id,
                        start,
                        end: text.len(),
                    });
                }
            }
            NodeKind::Element { name, .. } if LINE_BREAK_ELEMENTS.contains(&name.as_str()) => {
                push_separator(text);
                for child in &node.children {
                    self.collect_segments(*child, text, segments);
                }
                push_separator(text);
            }
            _ => {
                for child in &node.children {
                    self.collect_segments(*child, text, segments);
                }
            }
        }
    }

    fn point_to_offset(segments: &[Segment], point: TextPoint) -> Option<usize> {
        segments
            .iter()
            .find(|s| s.node == point.node)
            .map(|s| s.start + point.offset)
    }

    fn offsets_to_range(segments: &[Segment], start: usize, end: usize) -> Option<TextRange> {
        let first = segments.iter().find(|s| s.start <= start && start < s.end)?;
        let last = segments.iter().find(|s| s.start < end && end <= s.end)?;
        Some(TextRange {
            start: TextPoint {
                node: first.node,
                offset: start - first.start,
            },
            end: TextPoint {
                node: last.node,
                offset: end - last.start,
            },
        })
    }

    fn unsplittable_ancestor(&self, mut id: NodeId) -> Option<String> {
        loop {
            if let Some(name) = self.element_name(id) {
                if UNSPLITTABLE_ELEMENTS.contains(&name) {
                    return Some(name.to_string());
                }
            }
            id = self.nodes[id.0].parent?;
        }
    }

    /// Marker number if `id` is a marker element
    fn marker_number(&self, id: NodeId) -> Option<u64> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| *key == self.marker_config.id_attribute)
                .and_then(|(_, value)| value.parse().ok()),
            _ => None,
        }
    }

    fn enclosing_marker(&self, mut id: NodeId) -> Option<u64> {
        loop {
            if let Some(number) = self.marker_number(id) {
                return Some(number);
            }
            id = self.nodes[id.0].parent?;
        }
    }

    fn contained_marker(&self, id: NodeId) -> Option<u64> {
        self.marker_number(id).or_else(|| {
            self.nodes[id.0]
                .children
                .iter()
                .find_map(|child| self.contained_marker(*child))
        })
    }

    fn text_mut(&mut self, id: NodeId) -> Option<&mut String> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    fn validate_point(&self, point: TextPoint) -> std::result::Result<(), WrapError> {
        let node = self.nodes.get(point.node.0).ok_or(WrapError::Detached(point.node.0))?;
        let NodeKind::Text(text) = &node.kind else {
            return Err(WrapError::NotText(point.node.0));
        };
        if point.offset > text.len() || !text.is_char_boundary(point.offset) {
            return Err(WrapError::InvalidOffset {
                node: point.node.0,
                offset: point.offset,
            });
        }
        Ok(())
    }

    fn new_marker_element(&mut self, parent: NodeId, id: MarkerId) -> NodeId {
        let config = &self.marker_config;
        let mut attributes = vec![
            ("class".to_string(), config.class_name.clone()),
            (config.id_attribute.clone(), id.to_string()),
        ];
        if let Some(style) = &config.inline_style {
            attributes.push(("style".to_string(), style.clone()));
        }
        let name = config.tag.clone();
        let node = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind: NodeKind::Element { name, attributes },
            parent: Some(parent),
            children: Vec::new(),
        });
        node
    }

    fn new_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let node = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind: NodeKind::Text(text.to_string()),
            parent: Some(parent),
            children: Vec::new(),
        });
        node
    }

    fn subtree_text(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            _ => {
                for child in &node.children {
                    self.subtree_text(*child, out);
                }
            }
        }
    }
}

impl Default for XhtmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDocument for XhtmlDocument {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn find_and_select(&mut self, needle: &str, options: &FindOptions) -> bool {
        if needle.is_empty() || !self.capabilities.native_search {
            return false;
        }

        let (text, segments) = self.segments();
        let mut matches = Vec::new();
        let mut from = 0;
        while from <= text.len() {
            let found = if options.case_sensitive {
                text[from..].find(needle).map(|i| (from + i, from + i + needle.len()))
            } else {
                find_ignore_case(&text, needle, from)
            };
            let Some((start, end)) = found else { break };
            if !options.whole_word || is_whole_word(&text, start, end) {
                matches.push((start, end));
            }
            from = end;
        }

        // Continue from the current selection, like a browser's find
        let picked = if options.backwards {
            let cursor = self
                .selection
                .and_then(|s| Self::point_to_offset(&segments, s.start))
                .unwrap_or(text.len());
            matches
                .iter()
                .rev()
                .find(|(_, end)| *end <= cursor)
                .or_else(|| options.wrap_around.then(|| matches.last()).flatten())
        } else {
            let cursor = self
                .selection
                .and_then(|s| Self::point_to_offset(&segments, s.end))
                .unwrap_or(0);
            matches
                .iter()
                .find(|(start, _)| *start >= cursor)
                .or_else(|| options.wrap_around.then(|| matches.first()).flatten())
        };

        match picked.and_then(|(start, end)| Self::offsets_to_range(&segments, *start, *end)) {
            Some(range) => {
                self.selection = Some(range);
                true
            }
            None => false,
        }
    }

    fn surround_selection(&mut self, label: &str) -> std::result::Result<Marker, WrapError> {
        let range = self.selection.ok_or(WrapError::NoSelection)?;
        let marker = self.surround_range(&range, label)?;
        self.selection = None;
        Ok(marker)
    }

    fn text_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_text_nodes(self.content_root(), &mut out);
        out
    }

    fn node_text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    fn surround_range(
        &mut self,
        range: &TextRange,
        label: &str,
    ) -> std::result::Result<Marker, WrapError> {
        let TextRange { start, end } = *range;
        self.validate_point(start)?;
        self.validate_point(end)?;

        let parent = self.nodes[start.node.0]
            .parent
            .ok_or(WrapError::Detached(start.node.0))?;
        if self.nodes[end.node.0].parent != Some(parent) {
            return Err(WrapError::CrossesElementBoundary);
        }
        if let Some(name) = self.unsplittable_ancestor(parent) {
            return Err(WrapError::Unsplittable(name));
        }
        if let Some(number) = self.enclosing_marker(parent) {
            return Err(WrapError::OverlapsMarker(number));
        }

        let siblings = &self.nodes[parent.0].children;
        let start_index = siblings
            .iter()
            .position(|c| *c == start.node)
            .ok_or(WrapError::Detached(start.node.0))?;
        let end_index = siblings
            .iter()
            .position(|c| *c == end.node)
            .ok_or(WrapError::Detached(end.node.0))?;
        if end_index < start_index || (range.is_single_node() && end.offset <= start.offset) {
            return Err(WrapError::EmptyRange);
        }
        if !range.is_single_node() {
            if let Some(number) = siblings[start_index + 1..end_index]
                .iter()
                .find_map(|child| self.contained_marker(*child))
            {
                return Err(WrapError::OverlapsMarker(number));
            }
        }

        let marker_id = MarkerId(self.next_marker);
        let mark = self.new_marker_element(parent, marker_id);

        let start_text = self.node_text(start.node).unwrap_or_default().to_string();
        let mut mark_children = Vec::new();

        let mut replacement = Vec::new();
        if range.is_single_node() {
            let inner = self.new_text(mark, &start_text[start.offset..end.offset]);
            mark_children.push(inner);
            let after = &start_text[end.offset..];
            if !after.is_empty() {
                let after = self.new_text(parent, after);
                replacement.push(after);
            }
        } else {
            let end_text = self.node_text(end.node).unwrap_or_default().to_string();
            let head = self.new_text(mark, &start_text[start.offset..]);
            mark_children.push(head);
            let moved: Vec<NodeId> = self.nodes[parent.0].children[start_index + 1..end_index].to_vec();
            for child in &moved {
                self.nodes[child.0].parent = Some(mark);
            }
            mark_children.extend(moved);
            let tail = self.new_text(mark, &end_text[..end.offset]);
            mark_children.push(tail);
            if let Some(text) = self.text_mut(end.node) {
                *text = end_text[end.offset..].to_string();
            }
            replacement.push(end.node);
        }

        if let Some(text) = self.text_mut(start.node) {
            text.truncate(start.offset);
        }
        self.nodes[mark.0].children = mark_children;

        // start node (now the text before the range), marker, then what follows
        let mut children = self.nodes[parent.0].children[..=start_index].to_vec();
        children.push(mark);
        children.extend(replacement);
        children.extend_from_slice(&self.nodes[parent.0].children[end_index + 1..]);
        self.nodes[parent.0].children = children;

        let mut text = String::new();
        self.subtree_text(mark, &mut text);
        let marker = Marker {
            id: marker_id,
            text,
        };
        self.next_marker += 1;
        self.markers.push(MarkerRecord {
            marker: marker.clone(),
            label: label.to_string(),
        });
        self.notify_mutation();

        tracing::debug!(marker_id = %marker_id, parent = %parent, "Inserted marker");
        Ok(marker)
    }

    fn marker_for(&self, label: &str) -> Option<Marker> {
        self.markers
            .iter()
            .find(|r| same_quote(&r.label, label))
            .map(|r| r.marker.clone())
    }

    fn scroll_into_view(&mut self, target: ScrollTarget) {
        tracing::debug!(?target, "Scrolling into view");
        self.scrolls.push(target);
    }

    fn subscribe_mutations(&self) -> std::result::Result<MutationFeed, ObserverError> {
        match &self.mutations {
            Some(tx) => Ok(MutationFeed::new(tx.subscribe())),
            None => Err(ObserverError::Unavailable(
                "mutation observation disabled for this document".to_string(),
            )),
        }
    }
}

fn element_parts(e: &BytesStart<'_>) -> Result<(String, Vec<(String, String)>)> {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
    let mut attributes = Vec::new();
    for attr in e.html_attributes().with_checks(false) {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = html_escape::decode_html_entities(&raw).into_owned();
        attributes.push((key, value));
    }
    Ok((name, attributes))
}

fn push_separator(text: &mut String) {
    if !text.is_empty() && !text.ends_with(LINE_SEPARATOR) {
        text.push(LINE_SEPARATOR);
    }
}

fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}
