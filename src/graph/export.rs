//! Dependency graph export.
//!
//! Renders the edges of a [`DependencyIndex`] as a Graphviz `digraph`.

use super::DependencyIndex;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::Path;

/// Render every edge of `index` as Graphviz DOT.
///
/// Node names are shown relative to the index's project root. Each edge
/// points from the entry to the file it depends on.
pub fn to_dot(index: &DependencyIndex) -> String {
    let root = index.project_root();
    let edges = index.all_edges();

    let nodes: BTreeSet<String> = edges
        .iter()
        .flat_map(|(entry, dep)| [display_path(root, entry), display_path(root, dep)])
        .collect();

    let mut out = String::from("digraph dependencies {\n    rankdir=LR;\n");
    for node in &nodes {
        let _ = writeln!(out, "    \"{}\";", escape(node));
    }
    for (entry, dep) in &edges {
        let _ = writeln!(
            out,
            "    \"{}\" -> \"{}\";",
            escape(&display_path(root, entry)),
            escape(&display_path(root, dep))
        );
    }
    out.push_str("}\n");
    out
}

fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
