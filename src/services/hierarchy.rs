use std::collections::{HashMap, HashSet};

use tracing::instrument;

use crate::models::{PlaylistKind, PlaylistRow};

/// Structural problems in the catalog's playlist rows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("Duplicate playlist id in catalog: {id}")]
    DuplicateId { id: String },

    #[error("Playlist row '{name}' has no id")]
    MissingId { name: String },

    #[error("Cyclic parent references between playlists: {}", ids.join(", "))]
    Cycle { ids: Vec<String> },
}

/// A node of the playlist tree. The synthetic root carries no row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistNode {
    pub row: Option<PlaylistRow>,
    pub children: Vec<PlaylistNode>,
    /// Names of the ancestors below the root, excluding this node.
    pub path: Vec<String>,
}

impl PlaylistNode {
    pub fn id(&self) -> Option<&str> {
        self.row.as_ref().map(|row| row.id.as_str())
    }

    pub fn name(&self) -> &str {
        self.row.as_ref().map(|row| row.name.as_str()).unwrap_or("")
    }

    pub fn kind(&self) -> Option<PlaylistKind> {
        self.row.as_ref().map(|row| row.kind)
    }

    pub fn is_root(&self) -> bool {
        self.row.is_none()
    }

    /// Path including the node's own name, joined with `/`.
    pub fn display_path(&self) -> String {
        let mut segments = self.path.clone();
        segments.push(self.name().to_string());
        segments.join("/")
    }
}

/// The reconstructed hierarchy, rooted at a synthetic node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistTree {
    pub root: PlaylistNode,
    len: usize,
}

impl PlaylistTree {
    /// Number of non-root nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Depth-first, pre-order walk over every non-root node with its depth
    /// (0 for the root's direct children).
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PlaylistNode)> {
        let mut stack: Vec<(usize, &PlaylistNode)> =
            self.root.children.iter().rev().map(|c| (0, c)).collect();
        std::iter::from_fn(move || {
            let (depth, node) = stack.pop()?;
            stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
            Some((depth, node))
        })
    }

    pub fn find_by_id(&self, id: &str) -> Option<&PlaylistNode> {
        self.iter()
            .map(|(_, node)| node)
            .find(|node| node.id() == Some(id))
    }

    /// Find a node by its `/`-separated name path, e.g. `"Techno/Peak Time"`.
    pub fn find_by_path(&self, path: &str) -> Option<&PlaylistNode> {
        let mut current = &self.root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.children.iter().find(|c| c.name() == segment)?;
        }
        if current.is_root() { None } else { Some(current) }
    }

    pub fn find_by_name(&self, name: &str) -> Vec<&PlaylistNode> {
        self.iter()
            .map(|(_, node)| node)
            .filter(|node| node.name() == name)
            .collect()
    }
}

/// Reconstruct the playlist tree from flat parent-pointer rows.
///
/// Rows whose parent is missing from the set are attached to the root.
/// Siblings are ordered by `sequence`, then by `name`.
#[instrument(skip(rows), fields(num_rows = rows.len()))]
pub fn build_hierarchy(rows: Vec<PlaylistRow>) -> Result<PlaylistTree, HierarchyError> {
    let mut by_id: HashMap<String, PlaylistRow> = HashMap::with_capacity(rows.len());
    for row in rows {
        if row.id.is_empty() {
            return Err(HierarchyError::MissingId { name: row.name });
        }
        if by_id.contains_key(&row.id) {
            return Err(HierarchyError::DuplicateId { id: row.id });
        }
        by_id.insert(row.id.clone(), row);
    }

    // parent id -> child ids, with `None` standing for the synthetic root
    let mut children_of: HashMap<Option<String>, Vec<String>> = HashMap::new();
    for row in by_id.values() {
        let parent = match row.parent_id.as_deref() {
            _ if row.is_top_level() => None,
            Some(parent) if by_id.contains_key(parent) => Some(parent.to_string()),
            Some(parent) => {
                tracing::warn!(
                    id = %row.id,
                    name = %row.name,
                    parent_id = %parent,
                    "Playlist parent not found in catalog, attaching to root"
                );
                None
            }
            None => None,
        };
        children_of.entry(parent).or_default().push(row.id.clone());
    }

    for siblings in children_of.values_mut() {
        siblings.sort_by(|a, b| {
            let (a, b) = (&by_id[a], &by_id[b]);
            a.sequence.cmp(&b.sequence).then_with(|| a.name.cmp(&b.name))
        });
    }

    let builder = TreeBuilder {
        rows: &by_id,
        children_of: &children_of,
    };
    let mut visited = HashSet::new();
    let children = builder.build_children(None, &[], &mut visited);

    // Each row has exactly one parent, so the walk from the root cannot loop.
    // Rows in a parent cycle are never reached from the root.
    if visited.len() != by_id.len() {
        let mut ids: Vec<String> = by_id
            .keys()
            .filter(|id| !visited.contains(id.as_str()))
            .cloned()
            .collect();
        ids.sort();
        tracing::error!(?ids, "Playlists unreachable from root");
        return Err(HierarchyError::Cycle { ids });
    }

    Ok(PlaylistTree {
        root: PlaylistNode {
            row: None,
            children,
            path: Vec::new(),
        },
        len: visited.len(),
    })
}

struct TreeBuilder<'a> {
    rows: &'a HashMap<String, PlaylistRow>,
    children_of: &'a HashMap<Option<String>, Vec<String>>,
}

impl<'a> TreeBuilder<'a> {
    /// Build the children of `parent`, each carrying `path` as its own path.
    fn build_children(
        &self,
        parent: Option<&str>,
        path: &[String],
        visited: &mut HashSet<&'a str>,
    ) -> Vec<PlaylistNode> {
        let Some(child_ids) = self.children_of.get(&parent.map(String::from)) else {
            return Vec::new();
        };

        let rows: &'a HashMap<String, PlaylistRow> = self.rows;
        let mut nodes = Vec::with_capacity(child_ids.len());
        for child_id in child_ids {
            let row = &rows[child_id];
            let id = row.id.as_str();
            visited.insert(id);

            let mut child_path = path.to_vec();
            child_path.push(row.name.clone());

            let children = self.build_children(Some(id), &child_path, visited);

            nodes.push(PlaylistNode {
                row: Some(row.clone()),
                children,
                path: path.to_vec(),
            });
        }
        nodes
    }
}
