//! Structural tree view of the XML buffer.
//!
//! `project` turns XML text into an arena of element nodes with precomputed
//! XPaths. `TreeView` adds the interactive state (expansion, selection) that
//! survives between renders.

use roxmltree::{Document, Node};

use crate::doc_info::qualified_name;

const TEXT_PREVIEW_CHARS: usize = 80;

/// How the XML pane shows the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlViewMode {
    #[default]
    Text,
    Tree,
}

impl XmlViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            XmlViewMode::Text => "text",
            XmlViewMode::Tree => "tree",
        }
    }
}

impl std::str::FromStr for XmlViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(XmlViewMode::Text),
            "tree" => Ok(XmlViewMode::Tree),
            other => Err(format!("unknown view mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlTreeNode {
    /// Tag name as written, prefix included.
    pub tag_name: String,
    /// (name, value) pairs in document order.
    pub attributes: Vec<(String, String)>,
    /// Direct text and comment content, trimmed and truncated.
    pub direct_text: String,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub xpath: String,
    pub expanded: bool,
}

impl XmlTreeNode {
    /// `tag @a="1" @b="2": text`
    pub fn label(&self) -> String {
        let mut label = self.tag_name.clone();
        for (name, value) in &self.attributes {
            label.push_str(&format!(" @{name}=\"{value}\""));
        }
        if !self.direct_text.is_empty() {
            label.push_str(": ");
            label.push_str(&self.direct_text);
        }
        label
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlTree {
    nodes: Vec<XmlTreeNode>,
}

impl XmlTree {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&XmlTreeNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find_by_xpath(&self, xpath: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.xpath == xpath).map(NodeId)
    }

    /// Depth-first iteration over all node ids.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    pub message: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeProjection {
    Tree(XmlTree),
    Placeholder(Placeholder),
}

/// Parses XML and projects its elements into a tree.
pub fn project(xml: &str) -> TreeProjection {
    if xml.trim().is_empty() {
        return TreeProjection::Placeholder(Placeholder {
            kind: PlaceholderKind::Info,
            message: "No XML loaded".to_string(),
            detail: None,
        });
    }

    let doc = match Document::parse(xml) {
        Ok(doc) => doc,
        Err(roxmltree::Error::NoRootNode) => {
            return TreeProjection::Placeholder(Placeholder {
                kind: PlaceholderKind::Error,
                message: "No root element found".to_string(),
                detail: None,
            });
        }
        Err(err) => {
            return TreeProjection::Placeholder(Placeholder {
                kind: PlaceholderKind::Error,
                message: "Could not parse XML: contains parse errors".to_string(),
                detail: Some(err.to_string()),
            });
        }
    };

    let mut tree = XmlTree::default();
    let root = doc.root_element();
    let xpath = format!("/{}", qualified_name(root));
    push_node(&mut tree, root, None, 0, xpath);
    TreeProjection::Tree(tree)
}

fn push_node(
    tree: &mut XmlTree,
    node: Node<'_, '_>,
    parent: Option<NodeId>,
    depth: usize,
    xpath: String,
) -> NodeId {
    let id = NodeId(tree.nodes.len());
    let attributes = node
        .attributes()
        .map(|attr| {
            let name = match attr.namespace().and_then(|ns| node.lookup_prefix(ns)) {
                Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", attr.name()),
                _ => attr.name().to_string(),
            };
            (name, attr.value().to_string())
        })
        .collect();

    tree.nodes.push(XmlTreeNode {
        tag_name: qualified_name(node),
        attributes,
        direct_text: direct_text(node),
        children: Vec::new(),
        parent,
        depth,
        xpath: xpath.clone(),
        expanded: true,
    });

    let mut seen: Vec<(String, usize)> = Vec::new();
    for child in node.children().filter(Node::is_element) {
        let name = qualified_name(child);
        let index = match seen.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => {
                *count += 1;
                *count
            }
            None => {
                seen.push((name.clone(), 1));
                1
            }
        };
        let child_xpath = if index > 1 {
            format!("{xpath}/{name}[{index}]")
        } else {
            format!("{xpath}/{name}")
        };
        let child_id = push_node(tree, child, Some(id), depth + 1, child_xpath);
        tree.nodes[id.0].children.push(child_id);
    }
    id
}

fn direct_text(node: Node<'_, '_>) -> String {
    let raw: String = node
        .children()
        .filter(|c| c.is_text() || c.is_comment())
        .filter_map(|c| c.text())
        .collect();
    truncate_chars(raw.trim(), TEXT_PREVIEW_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push('…');
        out
    }
}

/// A flattened, renderable row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub id: NodeId,
    pub depth: usize,
    pub label: String,
    pub has_children: bool,
    pub expanded: bool,
    pub selected: bool,
}

/// Interactive tree state.
#[derive(Debug, Clone)]
pub struct TreeView {
    projection: TreeProjection,
    selected: Option<NodeId>,
}

impl Default for TreeView {
    fn default() -> Self {
        Self {
            projection: project(""),
            selected: None,
        }
    }
}

impl TreeView {
    /// Rebuilds the tree from scratch. A previous selection is kept when a
    /// node with the same XPath still exists.
    pub fn render(&mut self, xml: &str) {
        let previous = self.selected_xpath().map(str::to_string);
        self.projection = project(xml);
        self.selected = match (&self.projection, previous) {
            (TreeProjection::Tree(tree), Some(xpath)) => tree.find_by_xpath(&xpath),
            _ => None,
        };
    }

    pub fn projection(&self) -> &TreeProjection {
        &self.projection
    }

    pub fn tree(&self) -> Option<&XmlTree> {
        match &self.projection {
            TreeProjection::Tree(tree) => Some(tree),
            TreeProjection::Placeholder(_) => None,
        }
    }

    pub fn placeholder(&self) -> Option<&Placeholder> {
        match &self.projection {
            TreeProjection::Placeholder(p) => Some(p),
            TreeProjection::Tree(_) => None,
        }
    }

    /// Handles a label click: toggles that node and selects it.
    ///
    /// Returns the node's XPath, or `None` for an unknown id.
    pub fn toggle(&mut self, id: NodeId) -> Option<String> {
        let TreeProjection::Tree(tree) = &mut self.projection else {
            return None;
        };
        let node = tree.nodes.get_mut(id.0)?;
        node.expanded = !node.expanded;
        let xpath = node.xpath.clone();
        self.selected = Some(id);
        Some(xpath)
    }

    /// Selects a node by XPath without toggling it.
    pub fn select_xpath(&mut self, xpath: &str) -> Option<NodeId> {
        let id = self.tree()?.find_by_xpath(xpath)?;
        self.selected = Some(id);
        Some(id)
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn selected_xpath(&self) -> Option<&str> {
        let id = self.selected?;
        self.tree()?.node(id).map(|n| n.xpath.as_str())
    }

    /// Depth-first rows honoring expansion state.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        if let Some(tree) = self.tree()
            && !tree.is_empty()
        {
            self.collect_rows(tree, tree.root(), &mut rows);
        }
        rows
    }

    fn collect_rows(&self, tree: &XmlTree, id: NodeId, rows: &mut Vec<TreeRow>) {
        let Some(node) = tree.node(id) else {
            return;
        };
        rows.push(TreeRow {
            id,
            depth: node.depth,
            label: node.label(),
            has_children: !node.children.is_empty(),
            expanded: node.expanded,
            selected: self.selected == Some(id),
        });
        if node.expanded {
            for &child in &node.children {
                self.collect_rows(tree, child, rows);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(xml: &str) -> XmlTree {
        match project(xml) {
            TreeProjection::Tree(tree) => tree,
            TreeProjection::Placeholder(p) => panic!("unexpected placeholder: {p:?}"),
        }
    }

    fn xpaths(tree: &XmlTree) -> Vec<String> {
        tree.ids()
            .filter_map(|id| tree.node(id))
            .map(|n| n.xpath.clone())
            .collect()
    }

    #[test]
    fn test_sole_root_xpath() {
        let tree = tree_of("<R/>");
        assert_eq!(xpaths(&tree), vec!["/R"]);
    }

    #[test]
    fn test_same_name_siblings_indexed_from_second() {
        let tree = tree_of("<r><a/><b/><a/><a><c/></a></r>");
        assert_eq!(
            xpaths(&tree),
            vec!["/r", "/r/a", "/r/b", "/r/a[2]", "/r/a[3]", "/r/a[3]/c"]
        );
    }

    #[test]
    fn test_prefixes_retained() {
        let tree = tree_of(
            r#"<Invoice xmlns:cbc="urn:cbc"><cbc:ID>1</cbc:ID><cbc:ID>2</cbc:ID></Invoice>"#,
        );
        assert_eq!(
            xpaths(&tree),
            vec!["/Invoice", "/Invoice/cbc:ID", "/Invoice/cbc:ID[2]"]
        );
    }

    #[test]
    fn test_label_with_attributes_and_text() {
        let tree = tree_of(r#"<a x="1" y="two">  hello <!-- note --> </a>"#);
        let root = tree.node(tree.root()).unwrap();
        assert_eq!(root.attributes.len(), 2);
        assert_eq!(root.label(), r#"a @x="1" @y="two": hello  note"#);
    }

    #[test]
    fn test_direct_text_truncated() {
        let long = "x".repeat(100);
        let tree = tree_of(&format!("<a>{long}</a>"));
        let text = &tree.node(tree.root()).unwrap().direct_text;
        assert_eq!(text.chars().count(), 81);
        assert!(text.ends_with('…'));
    }

    #[test]
    fn test_placeholders() {
        let blank = project("  ");
        assert!(matches!(
            blank,
            TreeProjection::Placeholder(Placeholder { kind: PlaceholderKind::Info, ref message, .. }) if message == "No XML loaded"
        ));
        let TreeProjection::Placeholder(p) = project("<a><b></a>") else {
            panic!("expected placeholder");
        };
        assert_eq!(p.kind, PlaceholderKind::Error);
        assert_eq!(p.message, "Could not parse XML: contains parse errors");
        assert!(p.detail.is_some());
    }

    #[test]
    fn test_no_root_element_placeholders() {
        for xml in [r#"<?xml version="1.0"?>"#, "<!-- c -->"] {
            let TreeProjection::Placeholder(p) = project(xml) else {
                panic!("expected placeholder for {xml}");
            };
            assert_eq!(p.kind, PlaceholderKind::Error);
            assert_eq!(p.message, "No root element found");
            assert_eq!(p.detail, None);
        }

        let TreeProjection::Placeholder(p) = project("just text") else {
            panic!("expected placeholder");
        };
        assert_eq!(p.kind, PlaceholderKind::Error);
        assert_eq!(p.message, "Could not parse XML: contains parse errors");
    }

    #[test]
    fn test_toggle_selects_single_node() {
        let mut view = TreeView::default();
        view.render("<r><a><b/></a><c/></r>");
        assert_eq!(view.visible_rows().len(), 4);

        let a = view.tree().unwrap().find_by_xpath("/r/a").unwrap();
        assert_eq!(view.toggle(a).as_deref(), Some("/r/a"));
        assert_eq!(view.selected_xpath(), Some("/r/a"));
        let rows = view.visible_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().filter(|r| r.selected).count(), 1);

        let c = view.tree().unwrap().find_by_xpath("/r/c").unwrap();
        view.toggle(c);
        assert_eq!(view.selected_xpath(), Some("/r/c"));
        assert_eq!(view.visible_rows().iter().filter(|r| r.selected).count(), 1);
    }

    #[test]
    fn test_render_keeps_selection_by_xpath() {
        let mut view = TreeView::default();
        view.render("<r><a/></r>");
        view.select_xpath("/r/a");
        view.render("<r><z/><a/></r>");
        assert_eq!(view.selected_xpath(), Some("/r/a"));
        view.render("<r/>");
        assert_eq!(view.selected_xpath(), None);
    }
}
