use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::registry::ModelRegistry;

/// Summary of the belongs-to dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for belongs-to dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationGraphReport {
    pub summary: AssociationGraphSummary,
    /// Insertion order where every target precedes its owners.
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
    /// Models with a belongs-to pointing at themselves.
    pub self_references: Vec<String>,
}

/// Build a deterministic dependency report over non-polymorphic belongs-to edges.
///
/// Self-references are reported separately and do not count as cycles, since
/// the second creation pass leaves them unset.
pub fn build_association_graph_report(registry: &ModelRegistry) -> AssociationGraphReport {
    let (graph, self_references) = build_adjacency(registry);
    let nodes = graph.len();
    let edges = graph.values().map(|owners| owners.len()).sum();
    let summary = AssociationGraphSummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => AssociationGraphReport {
            summary,
            topo_order: Some(order),
            cycle: None,
            self_references,
        },
        Err(cycle) => AssociationGraphReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
            self_references,
        },
    }
}

/// Edges run from target to owner.
fn build_adjacency(registry: &ModelRegistry) -> (BTreeMap<String, BTreeSet<String>>, Vec<String>) {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut self_references = BTreeSet::new();

    for model in &registry.models {
        graph.entry(model.name.clone()).or_default();

        for association in model.belongs_to() {
            let Some(target) = association.target.as_ref() else {
                continue;
            };
            if *target == model.name {
                self_references.insert(model.name.clone());
                continue;
            }
            graph
                .entry(target.clone())
                .or_default()
                .insert(model.name.clone());
        }
    }

    (graph, self_references.into_iter().collect())
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> =
        graph.keys().map(|node| (node.as_str(), 0)).collect();

    for owners in graph.values() {
        for owner in owners {
            *indegree.entry(owner.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| *node)
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());

        if let Some(owners) = graph.get(node) {
            for owner in owners {
                if let Some(count) = indegree.get_mut(owner.as_str()) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(owner.as_str());
                    }
                }
            }
        }
    }

    if order.len() == indegree.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(node, _)| node.to_string())
            .collect())
    }
}
