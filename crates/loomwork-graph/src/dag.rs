//! The execution plan: a validated DAG of nodes with a topological layering
//! matching user-supplied stages.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use loomwork_core::delivery::{DeliveryId, Producer, RuntimeType};
use loomwork_core::factory::FactoryDescriptor;

/// A stage is an ordered group of factory descriptors runnable without
/// internal dependency. The graph crate only needs the descriptors, not the
/// live factory instances; those belong to `loomwork-runtime`.
#[derive(Debug, Clone, Default)]
pub struct StageSpec {
    pub descriptors: Vec<FactoryDescriptor>,
}

/// One node per factory instance in the graph.
///
/// `stage_id`/`index_in_stage` reflect the *current* layering (which may
/// have been rewritten by a [`crate::optimizer::PipelineOptimizer`]);
/// `origin_stage_id`/`origin_index_in_stage` are frozen at build time and
/// never change, so the runtime can always trace a node back to the
/// concrete factory instance it was built from, regardless of any later
/// stage-boundary rewrite.
#[derive(Debug, Clone)]
pub struct Node {
    pub stage_id: usize,
    /// Index of this factory within its stage's descriptor list. Disambiguates
    /// multiple instances of the same factory type within one stage.
    pub index_in_stage: usize,
    pub origin_stage_id: usize,
    pub origin_index_in_stage: usize,
    pub descriptor: FactoryDescriptor,
}

/// A satisfied input-slot binding. `from` is `None` when the producer is
/// the `External` sentinel.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: Option<NodeIndex>,
    pub to: NodeIndex,
    pub slot_index: usize,
    pub runtime_type: RuntimeType,
    pub delivery_id: DeliveryId,
}

#[derive(Debug, thiserror::Error)]
pub enum DagError {
    #[error("cycle detected in execution plan (should be impossible: edges only span earlier to later stages)")]
    CycleDetected,
    #[error("empty pipeline: no stages registered")]
    EmptyPipeline,
}

/// A validated, built execution plan.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    graph: DiGraph<Node, ()>,
    edges: Vec<Edge>,
    stage_count: usize,
}

impl ExecutionPlan {
    pub(crate) fn new(graph: DiGraph<Node, ()>, edges: Vec<Edge>, stage_count: usize) -> Result<Self, DagError> {
        let plan = Self {
            graph,
            edges,
            stage_count,
        };
        // Cycles are impossible by construction (edges only span earlier to
        // later stages), but re-checked defensively after assembly.
        plan.topological_order().map_err(|_| DagError::CycleDetected)?;
        Ok(plan)
    }

    pub fn stage_count(&self) -> usize {
        self.stage_count
    }

    pub fn nodes_in_stage(&self, stage_id: usize) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self
            .graph
            .node_weights()
            .filter(|n| n.stage_id == stage_id)
            .collect();
        nodes.sort_by_key(|n| n.index_in_stage);
        nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edges_into(&self, node: NodeIndex) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.to == node).collect()
    }

    pub fn node_index_of(&self, stage_id: usize, index_in_stage: usize) -> Option<NodeIndex> {
        self.graph.node_indices().find(|&idx| {
            let n = &self.graph[idx];
            n.stage_id == stage_id && n.index_in_stage == index_in_stage
        })
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.graph[idx]
    }

    pub fn topological_order(&self) -> Result<Vec<NodeIndex>, DagError> {
        toposort(&self.graph, None).map_err(|_| DagError::CycleDetected)
    }

    /// Render the plan as a textual DAG: one line per node, edges listed by
    /// endpoint identifiers.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut index_to_label: HashMap<NodeIndex, String> = HashMap::new();
        for idx in self.graph.node_indices() {
            let n = &self.graph[idx];
            index_to_label.insert(idx, format!("{}#{}", n.descriptor.factory_id, n.stage_id));
        }

        for stage_id in 0..self.stage_count {
            out.push_str(&format!("stage {stage_id}:\n"));
            for node in self.nodes_in_stage(stage_id) {
                let idx = self
                    .node_index_of(node.stage_id, node.index_in_stage)
                    .expect("node exists");
                let label = &index_to_label[&idx];
                out.push_str(&format!("  {label}\n"));
                for edge in self.edges_into(idx) {
                    let from_label = edge
                        .from
                        .map(|f| index_to_label[&f].clone())
                        .unwrap_or_else(|| Producer::External.to_string());
                    out.push_str(&format!(
                        "    <- {from_label} [{} id={:?} -> slot {}]\n",
                        edge.runtime_type, edge.delivery_id, edge.slot_index
                    ));
                }
            }
        }
        out
    }
}
