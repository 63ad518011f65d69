//! Finds armored messages in an accessibility tree.
//!
//! The tree belongs to another process and any node may disappear while it is
//! being walked, so every child lookup can come back empty. The locator only
//! reads the tree and copies what it needs into [`PgpNode`] records.
//!
//! A message rendered by the mail client's web view shows up as:
//!
//! ```text
//! android.webkit.WebView
//! |- android.webkit.WebView
//!    |- android.view.View   "-----BEGIN PGP MESSAGE-----..."
//!    |- android.view.View
//! ```

use crate::armor::BEGIN_PGP_MESSAGE;
use crate::types::{PgpNode, Rect};
use serde::{Deserialize, Serialize};

/// Class name of the web content container.
pub const WEB_VIEW_CLASS_NAME: &str = "android.webkit.WebView";

/// Class name of a plain text run inside a web view.
pub const VIEW_CLASS_NAME: &str = "android.view.View";

/// One node of an accessibility tree owned by the platform.
///
/// Implementations wrap whatever handle the platform hands out. All lookups
/// may fail on a stale node and then return `None`.
pub trait UiNode: Sized {
    fn class_name(&self) -> Option<String>;

    /// The content description of the node.
    fn text(&self) -> Option<String>;

    fn child_count(&self) -> usize;

    /// Child at `index`, or `None` if it has vanished.
    fn child(&self, index: usize) -> Option<Self>;

    fn bounds_on_screen(&self) -> Rect;
}

/// Owned copy of a node and its whole subtree.
///
/// Captured once per scan so platform handles can be released right away.
/// Also the JSON format of tree dumps; a vanished child is stored as `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSnapshot {
    #[serde(default)]
    pub class_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default)]
    pub bounds: Rect,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Option<NodeSnapshot>>,
}

impl NodeSnapshot {
    /// Create a childless node.
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: Some(class_name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_child(mut self, child: NodeSnapshot) -> Self {
        self.children.push(Some(child));
        self
    }

    /// Append a child slot whose node has vanished.
    pub fn with_missing_child(mut self) -> Self {
        self.children.push(None);
        self
    }

    /// Copy `root` and everything below it into owned records.
    pub fn capture<N: UiNode>(root: &N) -> Self {
        let children = (0..root.child_count())
            .map(|i| root.child(i).map(|child| Self::capture(&child)))
            .collect();

        Self {
            class_name: root.class_name(),
            text: root.text(),
            bounds: root.bounds_on_screen(),
            children,
        }
    }

    /// Number of present nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(NodeSnapshot::node_count)
            .sum::<usize>()
    }
}

impl<'a> UiNode for &'a NodeSnapshot {
    fn class_name(&self) -> Option<String> {
        self.class_name.clone()
    }

    fn text(&self) -> Option<String> {
        self.text.clone()
    }

    fn child_count(&self) -> usize {
        self.children.len()
    }

    fn child(&self, index: usize) -> Option<Self> {
        let node: &'a NodeSnapshot = *self;
        node.children.get(index).and_then(Option::as_ref)
    }

    fn bounds_on_screen(&self) -> Rect {
        self.bounds
    }
}

/// Depth-first search for text runs holding an armored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLocator {
    web_view_class: String,
    text_run_class: String,
}

impl Default for NodeLocator {
    fn default() -> Self {
        Self::new(WEB_VIEW_CLASS_NAME, VIEW_CLASS_NAME)
    }
}

impl NodeLocator {
    pub fn new(web_view_class: &str, text_run_class: &str) -> Self {
        Self {
            web_view_class: web_view_class.to_string(),
            text_run_class: text_run_class.to_string(),
        }
    }

    /// Find all descendants of `root` that hold an armored message, in tree order.
    ///
    /// A node matches when its parent is a web content container, it is a
    /// plain text run, and its text starts with the armor header marker.
    /// Matches are not searched further. The root itself is never a match.
    pub fn find_pgp_nodes<N: UiNode>(&self, root: &N) -> Vec<PgpNode> {
        let mut pgp_nodes = Vec::new();
        self.find_recursive(root, &mut pgp_nodes);
        log::debug!("[LOCATOR] Found {} armored message node(s)", pgp_nodes.len());
        pgp_nodes
    }

    fn find_recursive<N: UiNode>(&self, parent: &N, pgp_nodes: &mut Vec<PgpNode>) {
        let parent_is_web_view = parent.class_name().as_deref() == Some(self.web_view_class.as_str());

        for i in 0..parent.child_count() {
            let child = match parent.child(i) {
                Some(child) => child,
                None => {
                    log::trace!("[LOCATOR] Child {} vanished, skipping", i);
                    continue;
                }
            };

            if parent_is_web_view {
                if let Some(node) = self.match_text_run(&child) {
                    pgp_nodes.push(node);
                    continue;
                }
            }

            self.find_recursive(&child, pgp_nodes);
        }
    }

    fn match_text_run<N: UiNode>(&self, child: &N) -> Option<PgpNode> {
        let class_name = child.class_name()?;
        if class_name != self.text_run_class {
            return None;
        }

        let text = child.text().filter(|t| t.starts_with(BEGIN_PGP_MESSAGE))?;
        Some(PgpNode {
            class_name,
            text,
            bounds: child.bounds_on_screen(),
        })
    }
}

/// [`NodeLocator::find_pgp_nodes`] with the default web view class names.
pub fn find_pgp_nodes<N: UiNode>(root: &N) -> Vec<PgpNode> {
    NodeLocator::default().find_pgp_nodes(root)
}

/// Render the tree below `root` as indented text for debugging.
///
/// Each line is `{indent}{class} - {text preview}`, two spaces per level.
pub fn debug_tree<N: UiNode>(root: &N) -> String {
    let mut out = String::new();
    debug_tree_recursive(root, 0, &mut out);
    out
}

fn debug_tree_recursive<N: UiNode>(node: &N, indent: usize, out: &mut String) {
    let prefix = "  ".repeat(indent);
    let class_name = node.class_name().unwrap_or_else(|| "?".to_string());
    let preview = node
        .text()
        .map(|t| {
            let short: String = t.chars().take(50).collect();
            if short.len() < t.len() {
                format!("{}...", short)
            } else {
                short
            }
        })
        .unwrap_or_default();

    out.push_str(&format!("{}{} - {}\n", prefix, class_name, preview));

    for i in 0..node.child_count() {
        match node.child(i) {
            Some(child) => debug_tree_recursive(&child, indent + 1, out),
            None => out.push_str(&format!("{}  <gone>\n", prefix)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const MESSAGE: &str = "-----BEGIN PGP MESSAGE-----hQEMA1s=AbCd-----END PGP MESSAGE-----";

    fn web_view(children: Vec<NodeSnapshot>) -> NodeSnapshot {
        children
            .into_iter()
            .fold(NodeSnapshot::new(WEB_VIEW_CLASS_NAME), NodeSnapshot::with_child)
    }

    fn text_run(text: &str) -> NodeSnapshot {
        NodeSnapshot::new(VIEW_CLASS_NAME).with_text(text)
    }

    /// A conversation screen with the message nested the way the mail client renders it.
    fn conversation(message: &str) -> NodeSnapshot {
        NodeSnapshot::new("android.widget.FrameLayout")
            .with_child(NodeSnapshot::new("android.widget.TextView").with_text("Subject"))
            .with_child(web_view(vec![web_view(vec![
                text_run(message).with_bounds(Rect::new(0, 100, 1080, 900)),
                text_run("Reply"),
            ])]))
    }

    #[test]
    fn test_finds_message_in_nested_web_view() {
        let root = conversation(MESSAGE);
        let found = find_pgp_nodes(&&root);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, MESSAGE);
        assert_eq!(found[0].class_name, VIEW_CLASS_NAME);
        assert_eq!(found[0].bounds, Rect::new(0, 100, 1080, 900));
    }

    #[test]
    fn test_no_match_returns_empty() {
        let root = conversation("Hello, no secrets here");
        assert!(find_pgp_nodes(&&root).is_empty());
        assert!(find_pgp_nodes(&&NodeSnapshot::default()).is_empty());
    }

    #[test]
    fn test_matches_keep_tree_order() {
        let root = NodeSnapshot::new("root")
            .with_child(web_view(vec![text_run(&format!("{}first", MESSAGE))]))
            .with_child(web_view(vec![
                text_run(&format!("{}second", MESSAGE)),
                text_run(&format!("{}third", MESSAGE)),
            ]));

        let texts: Vec<String> = find_pgp_nodes(&&root).into_iter().map(|n| n.text).collect();
        assert_eq!(
            texts,
            vec![
                format!("{}first", MESSAGE),
                format!("{}second", MESSAGE),
                format!("{}third", MESSAGE)
            ]
        );
    }

    #[test]
    fn test_missing_child_does_not_abort_siblings() {
        let root = NodeSnapshot::new(WEB_VIEW_CLASS_NAME)
            .with_missing_child()
            .with_child(text_run(MESSAGE));
        assert_eq!(find_pgp_nodes(&&root).len(), 1);
    }

    #[test]
    fn test_text_run_outside_web_view_is_ignored() {
        let root = NodeSnapshot::new("android.widget.LinearLayout").with_child(text_run(MESSAGE));
        assert!(find_pgp_nodes(&&root).is_empty());
    }

    #[test]
    fn test_wrong_child_class_is_searched_deeper() {
        let root = web_view(vec![NodeSnapshot::new("android.widget.TextView")
            .with_text(MESSAGE)
            .with_child(web_view(vec![text_run(MESSAGE)]))]);

        let found = find_pgp_nodes(&&root);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].class_name, VIEW_CLASS_NAME);
    }

    #[test]
    fn test_match_is_not_descended() {
        let root = web_view(vec![text_run(MESSAGE).with_child(web_view(vec![text_run(MESSAGE)]))]);
        assert_eq!(find_pgp_nodes(&&root).len(), 1);
    }

    #[test]
    fn test_marker_is_case_sensitive_and_prefix_only() {
        let root = web_view(vec![
            text_run("-----begin pgp message-----hQ"),
            text_run("-----BEGIN PGP MESS"),
            text_run(&format!("Quoted: {}", MESSAGE)),
            text_run(""),
            NodeSnapshot::new(VIEW_CLASS_NAME),
        ]);
        assert!(find_pgp_nodes(&&root).is_empty());
    }

    #[test]
    fn test_root_is_never_a_match() {
        let root = text_run(MESSAGE);
        assert!(find_pgp_nodes(&&root).is_empty());
    }

    #[test]
    fn test_custom_class_names() {
        let locator = NodeLocator::new("WebArea", "StaticText");
        let root = NodeSnapshot::new("WebArea")
            .with_child(NodeSnapshot::new("StaticText").with_text(MESSAGE));

        assert_eq!(locator.find_pgp_nodes(&&root).len(), 1);
        assert!(find_pgp_nodes(&&root).is_empty());
    }

    #[test]
    fn test_capture_copies_subtree() {
        let root = conversation(MESSAGE).with_missing_child();
        let copy = NodeSnapshot::capture(&&root);

        assert_eq!(copy, root);
        assert_eq!(copy.node_count(), 6);
    }

    #[test]
    fn test_snapshot_json_with_missing_child() {
        let json = r#"{
            "class_name": "android.webkit.WebView",
            "children": [
                null,
                {"class_name": "android.view.View", "text": "-----BEGIN PGP MESSAGE-----hQ",
                 "bounds": {"left": 1, "top": 2, "right": 3, "bottom": 4}}
            ]
        }"#;
        let root: NodeSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(root.children.len(), 2);
        assert!(root.children[0].is_none());
        let found = find_pgp_nodes(&&root);
        assert_eq!(found[0].bounds, Rect::new(1, 2, 3, 4));
    }

    #[test]
    fn test_debug_tree_output() {
        let root = NodeSnapshot::new(WEB_VIEW_CLASS_NAME)
            .with_missing_child()
            .with_child(text_run("short"));
        let dump = debug_tree(&&root);

        assert_eq!(
            dump,
            "android.webkit.WebView - \n  <gone>\n  android.view.View - short\n"
        );
    }

    fn arb_tree() -> impl Strategy<Value = NodeSnapshot> {
        let leaf = (
            prop_oneof![Just(WEB_VIEW_CLASS_NAME), Just(VIEW_CLASS_NAME), Just("android.widget.TextView")],
            prop_oneof![
                Just(None),
                Just(Some(MESSAGE.to_string())),
                "[A-Za-z -]{0,40}".prop_map(Some),
            ],
        )
            .prop_map(|(class, text)| NodeSnapshot {
                class_name: Some(class.to_string()),
                text,
                ..NodeSnapshot::default()
            });

        leaf.prop_recursive(4, 64, 6, |inner| {
            (
                prop_oneof![Just(WEB_VIEW_CLASS_NAME), Just("android.widget.FrameLayout")],
                prop::collection::vec(prop::option::weighted(0.9, inner), 0..6),
            )
                .prop_map(|(class, children)| NodeSnapshot {
                    class_name: Some(class.to_string()),
                    children,
                    ..NodeSnapshot::default()
                })
        })
    }

    proptest! {
        #[test]
        fn prop_matches_always_start_with_marker(root in arb_tree()) {
            for node in find_pgp_nodes(&&root) {
                prop_assert!(node.text.starts_with(BEGIN_PGP_MESSAGE));
                prop_assert_eq!(node.class_name, VIEW_CLASS_NAME);
            }
        }

        #[test]
        fn prop_capture_is_lossless(root in arb_tree()) {
            prop_assert_eq!(NodeSnapshot::capture(&&root), root);
        }
    }
}
