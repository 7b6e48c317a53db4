//! Afferent/efferent coupling, instability, abstractness, and
//! distance-from-main-sequence metrics over a module dependency graph,
//! plus transitive reach.

use canopy_hash::AHashMap;
use std::hash::Hash;

/// Directed "depends on" edges between modules, plus each module's export
/// count (a crude abstractness proxy — heuristic, not semantic, since
/// there's no type information available at this layer).
#[derive(Debug, Clone)]
pub struct DependencyGraph<Id> {
    edges: AHashMap<Id, Vec<Id>>,
    export_counts: AHashMap<Id, usize>,
}

impl<Id: Eq + Hash + Clone> DependencyGraph<Id> {
    pub fn new() -> Self {
        Self {
            edges: AHashMap::default(),
            export_counts: AHashMap::default(),
        }
    }

    pub fn add_module(&mut self, id: Id, export_count: usize) {
        self.export_counts.insert(id.clone(), export_count);
        self.edges.entry(id).or_default();
    }

    pub fn add_dependency(&mut self, from: Id, to: Id) {
        let out = self.edges.entry(from).or_default();
        if !out.contains(&to) {
            out.push(to);
        }
    }

    pub fn modules(&self) -> impl Iterator<Item = &Id> {
        self.edges.keys()
    }

    pub fn dependencies_of(&self, id: &Id) -> &[Id] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn reverse_edges(&self) -> AHashMap<Id, Vec<Id>> {
        let mut reverse: AHashMap<Id, Vec<Id>> = AHashMap::default();
        for (from, targets) in &self.edges {
            for to in targets {
                reverse.entry(to.clone()).or_default().push(from.clone());
            }
        }
        reverse
    }
}

impl<Id: Eq + Hash + Clone> Default for DependencyGraph<Id> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityZone {
    MainSequence,
    ZoneOfPain,
    ZoneOfUselessness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouplingMetrics {
    pub efferent: u32,
    pub afferent: u32,
    pub instability: f64,
    pub abstractness: f64,
    pub distance: f64,
    pub zone: StabilityZone,
    pub risk: RiskLevel,
    pub coupling_bucket: u32,
}

fn coupling_bucket(total: u32) -> u32 {
    match total {
        0 => 0,
        1..=3 => 3,
        4..=7 => 7,
        8..=10 => 10,
        _ => 11,
    }
}

fn metrics_for(efferent: u32, afferent: u32, export_count: usize) -> CouplingMetrics {
    let instability = if afferent + efferent == 0 {
        0.5
    } else {
        efferent as f64 / (afferent + efferent) as f64
    };
    let abstractness = (export_count as f64 / 10.0).min(1.0);
    let distance = (abstractness + instability - 1.0).abs();

    let zone = if distance <= 0.3 {
        StabilityZone::MainSequence
    } else if instability < 0.5 && abstractness < 0.5 {
        StabilityZone::ZoneOfPain
    } else if instability > 0.5 && abstractness > 0.5 {
        StabilityZone::ZoneOfUselessness
    } else {
        StabilityZone::MainSequence
    };

    let total = efferent + afferent;
    let risk = if total <= 2 && distance <= 0.3 {
        RiskLevel::Low
    } else if total >= 10 || distance > 0.5 {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    };

    CouplingMetrics {
        efferent,
        afferent,
        instability,
        abstractness,
        distance,
        zone,
        risk,
        coupling_bucket: coupling_bucket(total),
    }
}

/// Computes coupling metrics for every module in the graph.
pub fn compute_metrics<Id: Eq + Hash + Clone>(graph: &DependencyGraph<Id>) -> AHashMap<Id, CouplingMetrics> {
    let reverse = graph.reverse_edges();
    graph
        .modules()
        .map(|id| {
            let efferent = graph.dependencies_of(id).len() as u32;
            let afferent = reverse.get(id).map(Vec::len).unwrap_or(0) as u32;
            let export_count = graph.export_counts.get(id).copied().unwrap_or(0);
            (id.clone(), metrics_for(efferent, afferent, export_count))
        })
        .collect()
}

/// BFS over forward edges from `start`, cycle-safe via a visited set.
/// Does not include `start` itself.
pub fn transitive_dependencies<Id: Eq + Hash + Clone>(graph: &DependencyGraph<Id>, start: &Id) -> Vec<Id> {
    let mut visited = std::collections::HashSet::new();
    visited.insert(start.clone());
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(start.clone());
    let mut result = Vec::new();

    while let Some(current) = queue.pop_front() {
        for dep in graph.dependencies_of(&current) {
            if visited.insert(dep.clone()) {
                result.push(dep.clone());
                queue.push_back(dep.clone());
            }
        }
    }
    result
}

/// The longest acyclic forward chain starting at `start`. A cycle back to
/// a node already on the current path does not extend depth past that
/// point.
pub fn max_depth<Id: Eq + Hash + Clone>(graph: &DependencyGraph<Id>, start: &Id) -> usize {
    let mut on_path = std::collections::HashSet::new();
    max_depth_inner(graph, start, &mut on_path)
}

fn max_depth_inner<Id: Eq + Hash + Clone>(graph: &DependencyGraph<Id>, node: &Id, on_path: &mut std::collections::HashSet<Id>) -> usize {
    if !on_path.insert(node.clone()) {
        return 0;
    }
    let depth = graph
        .dependencies_of(node)
        .iter()
        .map(|dep| 1 + max_depth_inner(graph, dep, on_path))
        .max()
        .unwrap_or(0);
    on_path.remove(node);
    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A→B→C, only A has no incoming edge: A Ce=1/Ca=0/I=1.0; C
    /// Ce=0/Ca=1/I=0.0; transitive-deps(A)={B,C}; max depth 2.
    #[test]
    fn linear_chain_matches_literal_scenario() {
        let mut graph = DependencyGraph::new();
        graph.add_module("A", 2);
        graph.add_module("B", 1);
        graph.add_module("C", 0);
        graph.add_dependency("A", "B");
        graph.add_dependency("B", "C");

        let metrics = compute_metrics(&graph);
        assert_eq!(metrics["A"].efferent, 1);
        assert_eq!(metrics["A"].afferent, 0);
        assert_eq!(metrics["A"].instability, 1.0);
        assert_eq!(metrics["C"].efferent, 0);
        assert_eq!(metrics["C"].afferent, 1);
        assert_eq!(metrics["C"].instability, 0.0);

        let mut deps = transitive_dependencies(&graph, &"A");
        deps.sort();
        assert_eq!(deps, vec!["B", "C"]);
        assert_eq!(max_depth(&graph, &"A"), 2);
    }

    #[test]
    fn isolated_module_is_instability_half() {
        let mut graph = DependencyGraph::new();
        graph.add_module("lonely", 0);
        let metrics = compute_metrics(&graph);
        assert_eq!(metrics["lonely"].instability, 0.5);
        assert_eq!(metrics["lonely"].zone, StabilityZone::MainSequence);
    }

    #[test]
    fn cycle_does_not_extend_depth_or_loop_forever() {
        let mut graph = DependencyGraph::new();
        graph.add_module("A", 0);
        graph.add_module("B", 0);
        graph.add_dependency("A", "B");
        graph.add_dependency("B", "A");

        assert_eq!(max_depth(&graph, &"A"), 1);
        let deps = transitive_dependencies(&graph, &"A");
        assert_eq!(deps, vec!["B"]);
    }

    #[test]
    fn high_coupling_and_far_from_main_sequence_is_high_risk() {
        let mut graph = DependencyGraph::new();
        graph.add_module("hub".to_string(), 10);
        for i in 0..9 {
            let dep = format!("dep{i}");
            graph.add_module(dep.clone(), 0);
            graph.add_dependency("hub".to_string(), dep);
        }
        let metrics = compute_metrics(&graph);
        assert_eq!(metrics["hub"].efferent, 9);
        assert_eq!(metrics["hub"].risk, RiskLevel::High);
        assert_eq!(metrics["hub"].coupling_bucket, 11);
    }
}
