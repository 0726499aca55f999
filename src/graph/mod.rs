//! Dependency index for incremental rebuilds.
//!
//! Tracks a bidirectional mapping between *entries* (files the build pipeline
//! processed directly) and every file their output was derived from. When a
//! file changes, [`DependencyIndex::affected_entries`] answers which entries
//! must be regenerated.
//!
//! # Invariants
//!
//! - For every tracked dependency `d`, the reverse set of `d` is exactly the
//!   set of entries whose forward set contains `d`.
//! - An entry always maps to itself so it can be found as its own root, but
//!   self edges are never reported by [`DependencyIndex::all_edges`].
//! - Paths outside the project root, or inside a vendor directory, are never
//!   tracked.
//! - A dependency whose reverse set becomes empty is dropped from the index.
//!
//! # Example
//!
//! ```ignore
//! use quire::graph::DependencyIndex;
//!
//! let index = DependencyIndex::new("/site", vec!["node_modules".to_string()]);
//! let recorder = index.begin_recording("/site/src/index.page");
//! recorder.record("/site/src/header.partial");
//!
//! let affected = index.affected_entries(Path::new("/site/src/header.partial"));
//! assert!(affected.contains(Path::new("/site/src/index.page")));
//! ```

pub mod export;

pub use export::*;

use path_clean::PathClean;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Edges {
    /// entry -> every file it depends on (including itself)
    forward: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    /// dependency -> every entry depending on it (an entry maps to itself)
    reverse: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl Edges {
    fn clear_entry(&mut self, entry: &Path) {
        let Some(dependencies) = self.forward.remove(entry) else {
            return;
        };

        for dependency in dependencies {
            if let Some(entries) = self.reverse.get_mut(&dependency) {
                entries.remove(entry);
                if entries.is_empty() {
                    self.reverse.remove(&dependency);
                }
            }
        }
    }

    fn insert(&mut self, entry: &Path, dependency: &Path) {
        self.forward.entry(entry.to_path_buf()).or_default().insert(dependency.to_path_buf());
        self.reverse.entry(dependency.to_path_buf()).or_default().insert(entry.to_path_buf());
    }
}

/// Bidirectional entry/dependency index shared by a build session.
///
/// The index is internally synchronized. Each entry only ever clears and
/// writes its own edges, so concurrent transforms in one pass never step on
/// each other.
#[derive(Debug)]
pub struct DependencyIndex {
    project_root: PathBuf,
    vendor_dirs: Vec<String>,
    edges: RwLock<Edges>,
}

impl DependencyIndex {
    /// Create an empty index rooted at `project_root`.
    ///
    /// `vendor_dirs` names directories (e.g. `node_modules`) whose contents
    /// are never tracked.
    pub fn new(project_root: impl Into<PathBuf>, vendor_dirs: Vec<String>) -> Self {
        Self { project_root: project_root.into(), vendor_dirs, edges: RwLock::new(Edges::default()) }
    }

    /// The project root this index accepts paths under.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn read(&self) -> RwLockReadGuard<'_, Edges> {
        self.edges.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Edges> {
        self.edges.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a fresh recording window for `entry`.
    ///
    /// Every edge previously owned by `entry` is dropped, and the entry is
    /// seeded with itself. The returned [`Recorder`] adds edges for this entry.
    /// The entry path is lexically cleaned first.
    pub fn begin_recording(&self, entry: impl Into<PathBuf>) -> Recorder<'_> {
        let entry = entry.into().clean();
        {
            let mut edges = self.write();
            edges.clear_entry(&entry);
            edges.insert(&entry, &entry);
        }
        Recorder { index: self, entry }
    }

    /// Record that `entry`'s output depends on `dependency`.
    ///
    /// Returns `true` if the edge is tracked (new or already present). Edges
    /// to external or vendored paths and self edges are discarded. Both paths
    /// are lexically cleaned, so `src/blog/../a.page` is keyed as `src/a.page`.
    pub fn record(&self, entry: &Path, dependency: &Path) -> bool {
        let (entry, dependency) = (entry.clean(), dependency.clean());
        if entry == dependency || !self.is_trackable(&entry) || !self.is_trackable(&dependency) {
            return false;
        }

        self.write().insert(&entry, &dependency);
        true
    }

    /// Whether a path may take part in the graph.
    ///
    /// A path is trackable when it lies under the project root and no
    /// component below the root names a vendor directory.
    pub fn is_trackable(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.project_root) else {
            return false;
        };

        !relative.components().any(|component| match component {
            Component::Normal(name) => {
                self.vendor_dirs.iter().any(|vendor| name.to_str() == Some(vendor.as_str()))
            }
            Component::ParentDir => true,
            _ => false,
        })
    }

    /// Compute the set of entries that must be rebuilt when `changed` changes.
    ///
    /// Follows dependency -> dependent edges transitively so that a file
    /// included by an include still resolves to the top-level entry. Every
    /// node reached that is itself an entry is part of the result. Cycles
    /// terminate through the visited set. An unknown path yields an empty set.
    pub fn affected_entries(&self, changed: &Path) -> BTreeSet<PathBuf> {
        let edges = self.read();
        let mut affected = BTreeSet::new();
        let mut visited: HashSet<&Path> = HashSet::new();
        let mut stack: Vec<&Path> = vec![changed];

        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }

            if edges.forward.contains_key(node) {
                affected.insert(node.to_path_buf());
            }

            if let Some(dependents) = edges.reverse.get(node) {
                stack.extend(
                    dependents.iter().map(PathBuf::as_path).filter(|d| !visited.contains(d)),
                );
            }
        }

        affected
    }

    /// Remove every edge owned by `entry`.
    ///
    /// Edges where `entry` is the dependency of another entry are left alone.
    pub fn invalidate(&self, entry: &Path) {
        self.write().clear_entry(entry);
    }

    /// Whether `path` is a recorded entry.
    pub fn is_entry(&self, path: &Path) -> bool {
        self.read().forward.contains_key(path)
    }

    /// Whether `path` is consumed as a dependency by some entry other than itself.
    pub fn is_dependency(&self, path: &Path) -> bool {
        self.read().reverse.get(path).is_some_and(|entries| entries.iter().any(|e| e != path))
    }

    /// The dependencies recorded for `entry`, excluding the entry itself.
    pub fn dependencies_of(&self, entry: &Path) -> Vec<PathBuf> {
        self.read()
            .forward
            .get(entry)
            .map(|deps| deps.iter().filter(|d| d.as_path() != entry).cloned().collect())
            .unwrap_or_default()
    }

    /// Every `(entry, dependency)` edge, ordered by entry then dependency.
    ///
    /// Self edges are excluded.
    pub fn all_edges(&self) -> Vec<(PathBuf, PathBuf)> {
        let edges = self.read();
        edges
            .forward
            .iter()
            .flat_map(|(entry, deps)| {
                deps.iter().filter(move |d| *d != entry).map(move |d| (entry.clone(), d.clone()))
            })
            .collect()
    }

    /// Number of recorded entries.
    pub fn entry_count(&self) -> usize {
        self.read().forward.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.read().forward.is_empty()
    }
}

/// Scoped capability for adding dependencies to one entry.
///
/// Created by [`DependencyIndex::begin_recording`].
#[derive(Debug)]
pub struct Recorder<'a> {
    index: &'a DependencyIndex,
    entry: PathBuf,
}

impl Recorder<'_> {
    /// The entry this recorder writes edges for.
    pub fn entry(&self) -> &Path {
        &self.entry
    }

    /// Record a dependency. Recording the same path twice is a no-op.
    pub fn record(&self, dependency: impl AsRef<Path>) -> bool {
        self.index.record(&self.entry, dependency.as_ref())
    }
}
