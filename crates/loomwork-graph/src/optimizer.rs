//! Pipeline optimization: rewriting an [`ExecutionPlan`] into an equivalent
//! but cheaper-to-run plan.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::dag::{DagError, Edge, ExecutionPlan, Node};

/// Rewrites an execution plan while preserving its observable semantics:
/// every edge's `(runtime_type, delivery_id, producer)` still resolves to
/// the same upstream node, and topological order is preserved.
pub trait PipelineOptimizer {
    fn optimize(&self, plan: ExecutionPlan) -> Result<ExecutionPlan, DagError>;
}

/// The default, no-op optimizer. Optimization is opt-in.
#[derive(Debug, Default)]
pub struct IdentityOptimizer;

impl PipelineOptimizer for IdentityOptimizer {
    fn optimize(&self, plan: ExecutionPlan) -> Result<ExecutionPlan, DagError> {
        Ok(plan)
    }
}

/// Collapses stage boundaries between stages that share no edge, merging
/// consecutive stages whose nodes are mutually independent into a single
/// stage. This only changes `stage_id` bookkeeping; node identity, edges,
/// and topological order are untouched, so dispatch behavior is unaffected
/// except that merged stages run as one dispatch round instead of two.
#[derive(Debug, Default)]
pub struct MergeIndependentStages;

impl PipelineOptimizer for MergeIndependentStages {
    fn optimize(&self, plan: ExecutionPlan) -> Result<ExecutionPlan, DagError> {
        let stage_count = plan.stage_count();
        if stage_count <= 1 {
            return Ok(plan);
        }

        // A stage boundary between k and k+1 can be erased only if no edge
        // crosses it, i.e. no node in stage k+1 depends on a node in stage k.
        let mut has_cross_edge = vec![false; stage_count];
        for edge in plan.edges() {
            if let Some(from) = edge.from {
                let from_stage = plan.node(from).stage_id;
                let to_stage = plan.node(edge.to).stage_id;
                if to_stage == from_stage + 1 {
                    has_cross_edge[to_stage] = true;
                }
            }
        }

        // Assign new stage ids by collapsing each boundary without a
        // crossing edge.
        let mut new_stage_id = vec![0usize; stage_count];
        for k in 1..stage_count {
            new_stage_id[k] = if has_cross_edge[k] {
                new_stage_id[k - 1] + 1
            } else {
                new_stage_id[k - 1]
            };
        }

        let mut graph: DiGraph<Node, ()> = DiGraph::new();
        let mut old_to_new: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut per_new_stage_counter: HashMap<usize, usize> = HashMap::new();

        for old_idx in plan.topological_order()? {
            let old_node = plan.node(old_idx);
            let mapped_stage = new_stage_id[old_node.stage_id];
            let index_in_stage = per_new_stage_counter.entry(mapped_stage).or_insert(0);
            let new_node = Node {
                stage_id: mapped_stage,
                index_in_stage: *index_in_stage,
                origin_stage_id: old_node.origin_stage_id,
                origin_index_in_stage: old_node.origin_index_in_stage,
                descriptor: old_node.descriptor.clone(),
            };
            *index_in_stage += 1;
            let new_idx = graph.add_node(new_node);
            old_to_new.insert(old_idx, new_idx);
        }

        let mut new_edges = Vec::with_capacity(plan.edges().len());
        for edge in plan.edges() {
            let to = old_to_new[&edge.to];
            let from = edge.from.map(|f| old_to_new[&f]);
            if let Some(from) = from {
                graph.add_edge(from, to, ());
            }
            new_edges.push(Edge {
                from,
                to,
                slot_index: edge.slot_index,
                runtime_type: edge.runtime_type,
                delivery_id: edge.delivery_id.clone(),
            });
        }

        let merged_stage_count = new_stage_id[stage_count - 1] + 1;
        ExecutionPlan::new(graph, new_edges, merged_stage_count)
    }
}
