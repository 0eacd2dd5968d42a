//! The PipelineInspector: builds the DAG from stages, verifying that every
//! non-optional input is satisfied by some available delivery or upstream
//! producer.

use petgraph::graph::{DiGraph, NodeIndex};

use loomwork_core::delivery::{Delivery, DeliverySignature};
use loomwork_core::error::{Error, Result};
use loomwork_core::factory::InputSlot;

use crate::dag::{DagError, Edge, ExecutionPlan, Node, StageSpec};

/// One entry in the "available set": either an externally-seeded delivery
/// or the not-yet-produced output of an upstream node.
struct AvailableItem {
    signature: DeliverySignature,
    origin: Option<NodeIndex>,
}

/// Builds and validates execution plans, caching the result between
/// `inspect` calls so re-inspection after a no-op is a no-op.
#[derive(Default)]
pub struct PipelineInspector {
    cached: Option<ExecutionPlan>,
}

impl PipelineInspector {
    pub fn new() -> Self {
        Self { cached: None }
    }

    pub fn is_stale(&self) -> bool {
        self.cached.is_none()
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn plan(&self) -> Option<&ExecutionPlan> {
        self.cached.as_ref()
    }

    /// Inspect `stages` against `seeded` deliveries, building (or returning
    /// the cached) execution plan.
    pub fn inspect(
        &mut self,
        stages: &[StageSpec],
        seeded: &[Delivery],
    ) -> Result<&ExecutionPlan> {
        if self.cached.is_none() {
            self.cached = Some(Self::build(stages, seeded)?);
        }
        Ok(self.cached.as_ref().expect("just populated"))
    }

    fn build(stages: &[StageSpec], seeded: &[Delivery]) -> Result<ExecutionPlan> {
        if stages.is_empty() {
            return Err(to_core_error(DagError::EmptyPipeline));
        }

        let mut graph: DiGraph<Node, ()> = DiGraph::new();
        let mut edges = Vec::new();

        let mut available: Vec<AvailableItem> = seeded
            .iter()
            .map(|d| AvailableItem {
                signature: d.signature(),
                origin: None,
            })
            .collect();

        // Stage 1: add all nodes up front so edges can reference any node
        // index regardless of discovery order.
        let mut stage_node_indices: Vec<Vec<NodeIndex>> = Vec::with_capacity(stages.len());
        for (stage_id, stage) in stages.iter().enumerate() {
            let mut indices = Vec::with_capacity(stage.descriptors.len());
            for (index_in_stage, descriptor) in stage.descriptors.iter().enumerate() {
                descriptor.validate()?;
                let idx = graph.add_node(Node {
                    stage_id,
                    index_in_stage,
                    origin_stage_id: stage_id,
                    origin_index_in_stage: index_in_stage,
                    descriptor: descriptor.clone(),
                });
                indices.push(idx);
            }
            stage_node_indices.push(indices);
        }

        // Stage 2: resolve input slots stage by stage, growing the
        // available set monotonically.
        for (stage_id, stage) in stages.iter().enumerate() {
            for (index_in_stage, descriptor) in stage.descriptors.iter().enumerate() {
                let to = stage_node_indices[stage_id][index_in_stage];
                for (slot_index, slot) in descriptor.inputs.iter().enumerate() {
                    match best_match(slot, &available)? {
                        Some(item) => {
                            if let Some(from) = item.origin {
                                graph.add_edge(from, to, ());
                            }
                            edges.push(Edge {
                                from: item.origin,
                                to,
                                slot_index,
                                runtime_type: slot.runtime_type,
                                delivery_id: slot.delivery_id.clone(),
                            });
                        }
                        None if slot.optional => {
                            // Optional slot with nothing to bind: leave it unbound.
                        }
                        None => {
                            return Err(Error::UnsatisfiedInput {
                                slot_type: slot.runtime_type.to_string(),
                                delivery_id: slot.delivery_id.to_string(),
                                producer: match &slot.producer {
                                    loomwork_core::delivery::Producer::External => None,
                                    loomwork_core::delivery::Producer::Factory(id) => {
                                        Some(id.to_string())
                                    }
                                },
                                consumer: slot.consumer.to_string(),
                            });
                        }
                    }
                }
            }

            // Now that every slot in this stage is resolved, this stage's
            // outputs become available to the next one.
            for (index_in_stage, descriptor) in stage.descriptors.iter().enumerate() {
                available.push(AvailableItem {
                    signature: descriptor.output_signature(),
                    origin: Some(stage_node_indices[stage_id][index_in_stage]),
                });
            }
        }

        ExecutionPlan::new(graph, edges, stages.len()).map_err(to_core_error)
    }
}

/// Resolve the best match for `slot` among `candidates`: a consumer-specific
/// delivery is preferred over one with an empty (any-consumer) set; among
/// equally specific matches, more than one candidate is an ambiguity the
/// inspector rejects outright rather than silently picking a "most recent"
/// winner. That fallback is reserved for the runtime dispatcher.
fn best_match<'a>(
    slot: &InputSlot,
    candidates: &'a [AvailableItem],
) -> Result<Option<&'a AvailableItem>> {
    let matching: Vec<&AvailableItem> = candidates
        .iter()
        .filter(|c| slot.matches_signature(&c.signature))
        .collect();

    if matching.is_empty() {
        return Ok(None);
    }

    let (specific, generic): (Vec<&AvailableItem>, Vec<&AvailableItem>) = matching
        .into_iter()
        .partition(|c| !c.signature.consumers.is_empty());
    let top_tier = if !specific.is_empty() { specific } else { generic };

    if top_tier.len() > 1 {
        return Err(Error::AmbiguousDelivery {
            slot_type: slot.runtime_type.to_string(),
            delivery_id: slot.delivery_id.to_string(),
            consumer: slot.consumer.to_string(),
            count: top_tier.len(),
        });
    }

    Ok(top_tier.into_iter().next())
}

fn to_core_error(e: DagError) -> Error {
    Error::Other(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loomwork_core::delivery::RuntimeType;
    use loomwork_core::factory::FactoryDescriptor;
    use loomwork_core::ids::FactoryId;

    fn stage_of(descriptors: Vec<FactoryDescriptor>) -> StageSpec {
        StageSpec { descriptors }
    }

    #[test]
    fn chained_string_to_container_s1() {
        let f1_id = FactoryId::new("F1");
        let f1 = FactoryDescriptor::new(f1_id.clone(), RuntimeType::of::<String>()).with_inputs(
            vec![InputSlot::required(f1_id.clone(), RuntimeType::of::<String>())],
        );

        let f3_id = FactoryId::new("F3");
        struct Container1;
        let f3 = FactoryDescriptor::new(f3_id.clone(), RuntimeType::of::<Container1>())
            .with_inputs(vec![InputSlot::required(
                f3_id.clone(),
                RuntimeType::of::<String>(),
            )]);

        let stages = vec![stage_of(vec![f1]), stage_of(vec![f3])];
        let seeded = vec![Delivery::new("id_of_product1".to_string())];

        let mut inspector = PipelineInspector::new();
        let plan = inspector.inspect(&stages, &seeded).unwrap();
        assert_eq!(plan.stage_count(), 2);
        assert_eq!(plan.edges().len(), 2);
    }

    #[test]
    fn unsatisfied_input_fails_before_any_factory_runs_s3() {
        let f_id = FactoryId::new("NeedsProduct2");
        struct Product2;
        let descriptor = FactoryDescriptor::new(f_id.clone(), RuntimeType::of::<()>())
            .with_inputs(vec![InputSlot::required(
                f_id,
                RuntimeType::of::<Product2>(),
            )]);

        let stages = vec![stage_of(vec![descriptor])];
        let mut inspector = PipelineInspector::new();
        let err = inspector.inspect(&stages, &[]).unwrap_err();
        assert!(matches!(err, Error::UnsatisfiedInput { .. }));
    }

    #[test]
    fn ambiguous_external_deliveries_fail_inspection_s4() {
        let f_id = FactoryId::new("NeedsString");
        let descriptor = FactoryDescriptor::new(f_id.clone(), RuntimeType::of::<()>())
            .with_inputs(vec![InputSlot::required(
                f_id,
                RuntimeType::of::<String>(),
            )]);

        let stages = vec![stage_of(vec![descriptor])];
        let seeded = vec![
            Delivery::new("a".to_string()),
            Delivery::new("b".to_string()),
        ];

        let mut inspector = PipelineInspector::new();
        let err = inspector.inspect(&stages, &seeded).unwrap_err();
        assert!(matches!(err, Error::AmbiguousDelivery { .. }));
    }

    #[test]
    fn generic_parameters_are_distinct_types_s5() {
        struct Container<T>(std::marker::PhantomData<T>);
        struct Product1;
        struct Product2;

        let f_id = FactoryId::new("NeedsContainerProduct2");
        let descriptor = FactoryDescriptor::new(f_id.clone(), RuntimeType::of::<()>())
            .with_inputs(vec![InputSlot::required(
                f_id,
                RuntimeType::of::<Container<Product2>>(),
            )]);

        let stages = vec![stage_of(vec![descriptor])];
        let seeded = vec![Delivery::new(Container::<Product1>(std::marker::PhantomData))];

        let mut inspector = PipelineInspector::new();
        let err = inspector.inspect(&stages, &seeded).unwrap_err();
        assert!(matches!(err, Error::UnsatisfiedInput { .. }));
    }

    #[test]
    fn consumer_scoped_disambiguation_s2() {
        let f1_id = FactoryId::new("F1");
        let f1 = FactoryDescriptor::new(f1_id.clone(), RuntimeType::of::<String>()).with_inputs(
            vec![InputSlot::required(f1_id.clone(), RuntimeType::of::<String>())],
        );
        let stages = vec![stage_of(vec![f1])];

        let seeded = vec![
            Delivery::new("wrong".to_string()),
            Delivery::new("id_of_product1".to_string()).with_consumers([f1_id.clone()]),
        ];

        let mut inspector = PipelineInspector::new();
        let plan = inspector.inspect(&stages, &seeded).unwrap();
        let edge = &plan.edges()[0];
        assert!(edge.from.is_none());
    }

    #[test]
    fn idempotent_reinspection_yields_identical_plan() {
        let f1_id = FactoryId::new("F1");
        let f1 = FactoryDescriptor::new(f1_id.clone(), RuntimeType::of::<i32>());
        let stages = vec![stage_of(vec![f1])];

        let mut inspector = PipelineInspector::new();
        let first_edges = inspector.inspect(&stages, &[]).unwrap().edges().len();
        let second_edges = inspector.inspect(&stages, &[]).unwrap().edges().len();
        assert_eq!(first_edges, second_edges);
    }
}
