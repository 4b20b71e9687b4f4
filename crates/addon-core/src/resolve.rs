//! Transitive dependency resolution
//!
//! Expands a requested addon into its full dependency closure against the
//! repository index. Expansion is breadth-first; range constraints
//! accumulate per id and are never retracted, so for every id the selected
//! candidate is the highest version satisfying everything seen so far.
//! Each id appears once in the result regardless of how many dependents
//! require it.

use std::collections::{BTreeMap, VecDeque};

use addon_repo::{AddonDescriptor, RepositoryIndex, VersionConstraint};

use crate::error::{Error, Result};

/// Requirement ids under this namespace are platform-provided modules, not
/// addons, and are excluded from expansion.
pub const SYSTEM_NAMESPACE: &str = "system.";

/// One accumulated range constraint and the addon that imposed it.
#[derive(Debug, Clone)]
pub struct ConstraintOrigin {
    /// The dependent that declared the requirement.
    pub required_by: String,
    /// The declared range; `None` accepts any version.
    pub range: Option<VersionConstraint>,
}

impl ConstraintOrigin {
    fn describe(&self) -> String {
        match &self.range {
            Some(range) => format!("{} requires {}", self.required_by, range),
            None => format!("{} requires any version", self.required_by),
        }
    }

    fn allows(&self, version: &semver::Version) -> bool {
        self.range.as_ref().is_none_or(|r| r.satisfies(version))
    }
}

/// The resolved dependency graph: one selected descriptor per reachable id,
/// rooted at the requested addon. Guaranteed acyclic.
#[derive(Debug, Clone)]
pub struct Resolution {
    root: String,
    selected: BTreeMap<String, AddonDescriptor>,
    edges: BTreeMap<String, Vec<String>>,
    constraints: BTreeMap<String, Vec<ConstraintOrigin>>,
}

impl Resolution {
    /// The requested root addon id.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Selected descriptor for `id`, if it is part of the graph.
    pub fn get(&self, id: &str) -> Option<&AddonDescriptor> {
        self.selected.get(id)
    }

    /// Whether `id` is part of the graph.
    pub fn contains(&self, id: &str) -> bool {
        self.selected.contains_key(id)
    }

    /// All ids in the graph, in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.selected.keys().map(String::as_str)
    }

    /// Number of addons in the graph.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Direct dependency ids of `id` within the graph.
    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Accumulated range constraints on `id`.
    pub fn constraints_on(&self, id: &str) -> &[ConstraintOrigin] {
        self.constraints.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids in dependency-first order (every id after all it depends on).
    ///
    /// Ties are broken alphabetically for a deterministic plan.
    pub fn topological_order(&self) -> Vec<String> {
        let mut remaining_deps: BTreeMap<&str, usize> = self
            .selected
            .keys()
            .map(|id| (id.as_str(), self.dependencies_of(id).len()))
            .collect();

        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (id, deps) in &self.edges {
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(id.as_str());
            }
        }

        let mut ready: VecDeque<&str> = remaining_deps
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut order = Vec::with_capacity(self.selected.len());
        while let Some(id) = ready.pop_front() {
            order.push(id.to_string());
            for &dependent in dependents.get(id).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(count) = remaining_deps.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        // Insert keeping the queue sorted so ties resolve
                        // alphabetically.
                        let pos =
                            ready.iter().position(|&r| r > dependent).unwrap_or(ready.len());
                        ready.insert(pos, dependent);
                    }
                }
            }
        }

        debug_assert_eq!(order.len(), self.selected.len(), "resolution graph is acyclic");
        order
    }

    /// Find a cycle reachable from the root, as the path of ids around it.
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }

        fn visit(
            graph: &Resolution,
            id: &str,
            marks: &mut BTreeMap<String, Mark>,
            path: &mut Vec<String>,
        ) -> Option<Vec<String>> {
            match marks.get(id) {
                Some(Mark::Done) => return None,
                Some(Mark::InProgress) => {
                    let start = path.iter().position(|p| p == id).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..].to_vec();
                    cycle.push(id.to_string());
                    return Some(cycle);
                }
                None => {}
            }

            marks.insert(id.to_string(), Mark::InProgress);
            path.push(id.to_string());
            for dep in graph.dependencies_of(id) {
                if let Some(cycle) = visit(graph, dep, marks, path) {
                    return Some(cycle);
                }
            }
            path.pop();
            marks.insert(id.to_string(), Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        let mut path = Vec::new();
        visit(self, &self.root, &mut marks, &mut path)
    }
}

/// Resolve the dependency closure of `root_id` against `index`.
///
/// # Errors
///
/// - [`Error::UnknownAddon`] when an id is wholly absent from the index
/// - [`Error::VersionConflict`] when no candidate satisfies the accumulated
///   constraints for an id
/// - [`Error::DependencyCycle`] when the resulting graph is cyclic
pub fn resolve(root_id: &str, index: &RepositoryIndex) -> Result<Resolution> {
    let mut resolution = Resolution {
        root: root_id.to_string(),
        selected: BTreeMap::new(),
        edges: BTreeMap::new(),
        constraints: BTreeMap::new(),
    };

    let mut queue: VecDeque<String> = VecDeque::from([root_id.to_string()]);

    while let Some(id) = queue.pop_front() {
        let candidates = index.candidates(&id);
        if candidates.is_empty() {
            return Err(Error::UnknownAddon { id });
        }

        let active = resolution.constraints.get(&id).cloned().unwrap_or_default();
        let pick = candidates
            .iter()
            .find(|d| active.iter().all(|c| c.allows(&d.version)));
        let Some(pick) = pick else {
            return Err(Error::VersionConflict {
                constraints: active.iter().map(ConstraintOrigin::describe).collect(),
                id,
            });
        };

        let unchanged = resolution
            .selected
            .get(&id)
            .is_some_and(|current| current.version == pick.version);
        if unchanged {
            continue;
        }

        tracing::debug!(addon = %id, version = %pick.version, "selected candidate");
        resolution.selected.insert(id.clone(), pick.clone());

        let mut deps = Vec::new();
        for req in &pick.requires {
            if req.addon.starts_with(SYSTEM_NAMESPACE) {
                continue;
            }
            deps.push(req.addon.clone());

            let origin = ConstraintOrigin {
                required_by: id.clone(),
                range: req.range.clone(),
            };
            let still_satisfied = resolution
                .selected
                .get(&req.addon)
                .is_some_and(|current| origin.allows(&current.version));
            resolution
                .constraints
                .entry(req.addon.clone())
                .or_default()
                .push(origin);

            if !still_satisfied {
                queue.push_back(req.addon.clone());
            }
        }
        resolution.edges.insert(id, deps);
    }

    if let Some(path) = resolution.find_cycle() {
        return Err(Error::DependencyCycle { path });
    }

    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use addon_repo::{Release, RepositoryIndex};

    fn index(doc: &str) -> RepositoryIndex {
        RepositoryIndex::parse(Release::parse("leia").unwrap(), "https://m.example/leia", doc)
            .unwrap()
    }

    #[test]
    fn single_addon_resolves_to_itself() {
        let idx = index(r#"{"addons": [{"id": "plugin.solo", "version": "1.0.0", "path": "a.zip"}]}"#);
        let res = resolve("plugin.solo", &idx).unwrap();

        assert_eq!(res.root(), "plugin.solo");
        assert_eq!(res.len(), 1);
        assert!(res.contains("plugin.solo"));
    }

    #[test]
    fn system_requirements_are_skipped() {
        let idx = index(
            r#"{"addons": [
                {"id": "plugin.demo", "version": "1.0.0", "path": "a.zip",
                 "requires": [{"addon": "system.python", "version": ">=3.0"}]}
            ]}"#,
        );
        let res = resolve("plugin.demo", &idx).unwrap();
        assert_eq!(res.len(), 1);
        assert!(res.dependencies_of("plugin.demo").is_empty());
    }

    #[test]
    fn topological_order_is_dependency_first() {
        let idx = index(
            r#"{"addons": [
                {"id": "a", "version": "1.0.0", "path": "a.zip",
                 "requires": [{"addon": "b"}, {"addon": "c"}]},
                {"id": "b", "version": "1.0.0", "path": "b.zip", "requires": [{"addon": "c"}]},
                {"id": "c", "version": "1.0.0", "path": "c.zip"}
            ]}"#,
        );
        let res = resolve("a", &idx).unwrap();
        let order = res.topological_order();

        let pos = |id: &str| order.iter().position(|o| o == id).unwrap();
        assert!(pos("c") < pos("b"));
        assert!(pos("b") < pos("a"));
    }

    #[test]
    fn cycle_is_detected_with_path() {
        let idx = index(
            r#"{"addons": [
                {"id": "a", "version": "1.0.0", "path": "a.zip", "requires": [{"addon": "b"}]},
                {"id": "b", "version": "1.0.0", "path": "b.zip", "requires": [{"addon": "a"}]}
            ]}"#,
        );
        let err = resolve("a", &idx).unwrap_err();
        match err {
            Error::DependencyCycle { path } => {
                assert_eq!(path.first().map(String::as_str), path.last().map(String::as_str));
                assert!(path.len() >= 3);
            }
            other => panic!("expected DependencyCycle, got: {other:?}"),
        }
    }
}
