//! Tree traversal over the document store.
//!
//! All traversal goes through the store by id; no parent/child pointers are
//! held by the documents themselves. [`TreeView`] borrows a store and offers
//! the queries the ingester and operator tools need: ancestors, descendants,
//! breadcrumbs, structural validation and an ASCII rendering.

use crate::document::Document;
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A structural problem found while validating a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeIssue {
    /// The requested root id does not exist.
    RootNotFound { root_id: String },
    /// The root has a parent_id.
    RootHasParent { root_id: String },
    /// A node was reached twice while walking down.
    CycleDetected { doc_id: String },
    /// A node's stored level disagrees with its depth.
    WrongLevel {
        doc_id: String,
        level: u8,
        expected: u8,
    },
}

/// Read-only tree queries over a [`DocumentStore`].
pub struct TreeView<'a> {
    store: &'a DocumentStore,
}

impl<'a> TreeView<'a> {
    /// Creates a view over the given store.
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    /// Ancestors of `id`, nearest first, ending at the root.
    pub fn ancestors(&self, id: &str) -> Vec<&'a Document> {
        let mut ancestors = Vec::new();
        let mut current = self.store.get(id);
        let mut seen = HashSet::new();
        while let Some(doc) = current {
            if !seen.insert(doc.id.as_str()) {
                break;
            }
            match &doc.parent_id {
                Some(parent_id) => {
                    current = self.store.get(parent_id);
                    if let Some(parent) = current {
                        ancestors.push(parent);
                    }
                }
                None => break,
            }
        }
        ancestors
    }

    /// The root above `id` (or the document itself if it is a root).
    pub fn root_of(&self, id: &str) -> Option<&'a Document> {
        let doc = self.store.get(id)?;
        if doc.is_root() {
            return Some(doc);
        }
        self.ancestors(id).into_iter().last()
    }

    /// All descendants of `id` in depth-first order.
    pub fn descendants(&self, id: &str) -> Vec<&'a Document> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.walk(id, &mut out, &mut seen);
        out
    }

    fn walk(&self, id: &str, out: &mut Vec<&'a Document>, seen: &mut HashSet<String>) {
        for child_id in self.store.children_of(id) {
            if !seen.insert(child_id.clone()) {
                continue;
            }
            if let Some(child) = self.store.get(child_id) {
                out.push(child);
                self.walk(child_id, out, seen);
            }
        }
    }

    /// Titles from the root down to `id`, for display.
    pub fn breadcrumb(&self, id: &str) -> Vec<String> {
        let Some(doc) = self.store.get(id) else {
            return Vec::new();
        };
        let mut path: Vec<String> = self
            .ancestors(id)
            .into_iter()
            .map(|d| d.title.clone())
            .collect();
        path.reverse();
        path.push(doc.title.clone());
        path
    }

    /// Concatenates a section's text with all of its descendants.
    ///
    /// Used to hand a complete provision (section plus subsections) to the
    /// context formatter.
    pub fn complete_provision(&self, id: &str) -> String {
        let Some(doc) = self.store.get(id) else {
            return String::new();
        };
        let mut parts = vec![doc.full_text.clone()];
        for descendant in self.descendants(id) {
            if !doc.full_text.contains(descendant.full_text.as_str()) {
                parts.push(descendant.full_text.clone());
            }
        }
        parts.join("\n")
    }

    /// Validates the tree rooted at `root_id`.
    pub fn validate(&self, root_id: &str) -> Vec<TreeIssue> {
        let mut issues = Vec::new();

        let Some(root) = self.store.get(root_id) else {
            issues.push(TreeIssue::RootNotFound {
                root_id: root_id.to_string(),
            });
            return issues;
        };
        if root.parent_id.is_some() {
            issues.push(TreeIssue::RootHasParent {
                root_id: root_id.to_string(),
            });
        }

        let mut visited = HashSet::new();
        self.check_node(root, 0, &mut visited, &mut issues);
        issues
    }

    fn check_node(
        &self,
        doc: &Document,
        expected_level: u8,
        visited: &mut HashSet<String>,
        issues: &mut Vec<TreeIssue>,
    ) {
        if !visited.insert(doc.id.clone()) {
            issues.push(TreeIssue::CycleDetected {
                doc_id: doc.id.clone(),
            });
            return;
        }
        if doc.level != expected_level {
            issues.push(TreeIssue::WrongLevel {
                doc_id: doc.id.clone(),
                level: doc.level,
                expected: expected_level,
            });
        }
        for child_id in self.store.children_of(&doc.id) {
            if let Some(child) = self.store.get(child_id) {
                self.check_node(child, expected_level + 1, visited, issues);
            }
        }
    }

    /// Renders the tree under `root_id` as ASCII, one node per line.
    pub fn render(&self, root_id: &str) -> String {
        let Some(root) = self.store.get(root_id) else {
            return format!("document not found: {root_id}");
        };
        let mut lines = vec![root.title.clone()];
        let children = self.store.children_of(root_id);
        for (i, child_id) in children.iter().enumerate() {
            self.render_node(child_id, "", i + 1 == children.len(), &mut lines);
        }
        lines.join("\n")
    }

    fn render_node(&self, id: &str, prefix: &str, is_last: bool, lines: &mut Vec<String>) {
        let Some(doc) = self.store.get(id) else {
            return;
        };
        let connector = if is_last { "└── " } else { "├── " };
        lines.push(format!("{prefix}{connector}{}", doc.title));

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let children = self.store.children_of(id);
        for (i, child_id) in children.iter().enumerate() {
            self.render_node(child_id, &child_prefix, i + 1 == children.len(), lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocType;

    fn sample_store() -> DocumentStore {
        let mut store = DocumentStore::new();
        store
            .insert(Document::new("act", DocType::Statute, 0, "Act", "the act"))
            .unwrap();
        store
            .insert(
                Document::new("act_s1", DocType::Statute, 1, "Section 1", "1. first section")
                    .with_parent("act")
                    .with_section_number("1"),
            )
            .unwrap();
        store
            .insert(
                Document::new("act_s1_a", DocType::Statute, 2, "(a)", "(a) a subsection")
                    .with_parent("act_s1")
                    .with_section_number("1")
                    .with_subsection("a"),
            )
            .unwrap();
        store
            .insert(
                Document::new("act_s2", DocType::Statute, 1, "Section 2", "2. second section")
                    .with_parent("act")
                    .with_section_number("2"),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_ancestors_and_root() {
        let store = sample_store();
        let tree = TreeView::new(&store);

        let ancestors = tree.ancestors("act_s1_a");
        assert_eq!(ancestors.len(), 2);
        assert_eq!(ancestors[0].id, "act_s1");
        assert_eq!(ancestors[1].id, "act");
        assert_eq!(tree.root_of("act_s1_a").unwrap().id, "act");
    }

    #[test]
    fn test_descendants_depth_first() {
        let store = sample_store();
        let tree = TreeView::new(&store);
        let ids: Vec<&str> = tree.descendants("act").iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["act_s1", "act_s1_a", "act_s2"]);
    }

    #[test]
    fn test_breadcrumb() {
        let store = sample_store();
        let tree = TreeView::new(&store);
        assert_eq!(tree.breadcrumb("act_s1_a"), ["Act", "Section 1", "(a)"]);
    }

    #[test]
    fn test_validate_clean_tree() {
        let store = sample_store();
        let tree = TreeView::new(&store);
        assert!(tree.validate("act").is_empty());
    }

    #[test]
    fn test_validate_missing_root() {
        let store = sample_store();
        let tree = TreeView::new(&store);
        let issues = tree.validate("nope");
        assert!(matches!(issues[0], TreeIssue::RootNotFound { .. }));
    }

    #[test]
    fn test_render_contains_all_titles() {
        let store = sample_store();
        let tree = TreeView::new(&store);
        let rendered = tree.render("act");
        for title in ["Act", "Section 1", "(a)", "Section 2"] {
            assert!(rendered.contains(title), "missing {title} in:\n{rendered}");
        }
    }
}
