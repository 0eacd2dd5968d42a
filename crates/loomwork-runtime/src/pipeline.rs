//! Pipeline: the top-level driver that owns the stage registry, the
//! dispatcher, and the inspector, and runs stages in order.

use std::collections::HashMap;
use std::sync::Arc;

use loomwork_core::delivery::{Delivery, RuntimeType};
use loomwork_core::error::{Error, Result};
use loomwork_core::factory::AnyFactory;
use loomwork_core::ids::{DeliveryId, FactoryId};
use loomwork_graph::{ExecutionPlan, PipelineInspector, PipelineOptimizer, StageSpec};

use crate::cancel::CancelToken;
use crate::dispatcher::DeliverableDispatcher;
use crate::stage::Stage;

/// The pipeline's Building/Inspected/Running/Done state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Building,
    Inspected,
    Running,
    Done,
}

pub struct Pipeline {
    stages: Vec<Stage>,
    seeded: Vec<Delivery>,
    dispatcher: Arc<DeliverableDispatcher>,
    inspector: PipelineInspector,
    optimizer: Option<Box<dyn PipelineOptimizer + Send + Sync>>,
    state: PipelineState,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            seeded: Vec::new(),
            dispatcher: Arc::new(DeliverableDispatcher::new()),
            inspector: PipelineInspector::new(),
            optimizer: None,
            state: PipelineState::Building,
        }
    }

    pub fn with_optimizer(mut self, optimizer: Box<dyn PipelineOptimizer + Send + Sync>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Register a pre-built envelope.
    pub fn set_input(&mut self, delivery: Delivery) -> Result<&mut Self> {
        self.guard_not_running()?;
        self.seeded.push(delivery);
        self.invalidate();
        Ok(self)
    }

    /// Convenience overload: seed a bare payload, optionally scoped to one
    /// consumer and/or tagged with a delivery id.
    pub fn set_input_for<T: std::any::Any + Send + Sync + 'static>(
        &mut self,
        payload: T,
        consumer: Option<FactoryId>,
        delivery_id: Option<DeliveryId>,
    ) -> Result<&mut Self> {
        let mut delivery = Delivery::new(payload);
        if let Some(c) = consumer {
            delivery = delivery.with_consumers([c]);
        }
        if let Some(id) = delivery_id {
            delivery = delivery.with_delivery_id(id);
        }
        self.set_input(delivery)
    }

    /// Register an explicit, possibly multi-factory stage. `end` is always
    /// recomputed so the previous last stage stops being the end stage.
    pub fn add_stage(&mut self, mut stage: Stage) -> Result<&mut Self> {
        self.guard_not_running()?;
        if let Some(last) = self.stages.last_mut() {
            last.end = false;
        }
        stage.stage_id = self.stages.len();
        stage.end = true;
        self.stages.push(stage);
        self.invalidate();
        Ok(self)
    }

    /// Register a single factory as its own stage.
    pub fn add_factory(&mut self, factory: Box<dyn AnyFactory>) -> Result<&mut Self> {
        let mut stage = Stage::new(self.stages.len());
        stage.push(factory);
        self.add_stage(stage)
    }

    fn guard_not_running(&self) -> Result<()> {
        if self.state == PipelineState::Running {
            return Err(Error::Other(
                "pipeline is running; concurrent mutation is disallowed".into(),
            ));
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.inspector.invalidate();
        self.state = PipelineState::Building;
    }

    fn stage_specs(&self) -> Vec<StageSpec> {
        self.stages
            .iter()
            .map(|s| StageSpec {
                descriptors: s.factories.iter().map(|f| f.descriptor()).collect(),
            })
            .collect()
    }

    /// Force inspection if stale, caching the validated plan. Re-inspection
    /// with no structural mutation since is a no-op.
    fn ensure_inspected(&mut self) -> Result<()> {
        if self.inspector.is_stale() {
            let specs = self.stage_specs();
            self.inspector.inspect(&specs, &self.seeded)?;
            self.state = PipelineState::Inspected;
        }
        Ok(())
    }

    fn optimized_plan(&mut self) -> Result<ExecutionPlan> {
        self.ensure_inspected()?;
        let raw = self
            .inspector
            .plan()
            .expect("ensure_inspected populates the cache")
            .clone();
        match &self.optimizer {
            Some(optimizer) => optimizer
                .optimize(raw)
                .map_err(|e| Error::Other(e.to_string())),
            None => Ok(raw),
        }
    }

    /// Inspect and render the plan as text.
    pub fn describe(&mut self) -> Result<String> {
        let plan = self.optimized_plan()?;
        Ok(plan.render())
    }

    /// Run every stage in order: dispatch, execute lifecycle, collect
    /// output.
    pub async fn run(&mut self, cancel: &CancelToken) -> Result<()> {
        if self.state == PipelineState::Running {
            return Err(Error::Other("pipeline is already running".into()));
        }

        let plan = self.optimized_plan()?;
        self.state = PipelineState::Running;

        let original_parallel: Vec<bool> = self.stages.iter().map(|s| s.parallel).collect();
        let mut pool: HashMap<(usize, usize), Box<dyn AnyFactory>> = HashMap::new();
        for (origin_stage_id, stage) in std::mem::take(&mut self.stages).into_iter().enumerate() {
            for (origin_index_in_stage, factory) in stage.factories.into_iter().enumerate() {
                pool.insert((origin_stage_id, origin_index_in_stage), factory);
            }
        }

        for round in 0..plan.stage_count() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let nodes = plan.nodes_in_stage(round);
            let parallel = nodes
                .iter()
                .any(|n| original_parallel.get(n.origin_stage_id).copied().unwrap_or(false));

            let mut round_stage = Stage::new(round).with_parallel(parallel);
            for node in &nodes {
                let factory = pool
                    .remove(&(node.origin_stage_id, node.origin_index_in_stage))
                    .expect("every plan node maps to a live factory instance");
                round_stage.push(factory);
            }

            round_stage.run(&self.dispatcher).await?;
        }

        self.state = PipelineState::Done;
        Ok(())
    }

    /// The most recently produced delivery of type `T`. In a well-formed
    /// pipeline this is the end stage's output, since every upstream
    /// delivery was registered first.
    pub async fn get_last_output<T>(&self) -> Result<T>
    where
        T: Clone + 'static,
    {
        let runtime_type = RuntimeType::of::<T>();
        let deliveries = self.dispatcher.find_by_type(runtime_type).await;
        deliveries
            .last()
            .and_then(|d| d.get::<T>())
            .cloned()
            .ok_or_else(|| Error::LookupMiss(runtime_type.to_string()))
    }

    /// The most recent output produced by factory class `F`.
    pub async fn get_output<F: 'static, T>(&self) -> Result<T>
    where
        T: Clone + 'static,
    {
        let factory_id = FactoryId::of::<F>();
        let runtime_type = RuntimeType::of::<T>();
        let deliveries = self.dispatcher.find_by_type(runtime_type).await;
        deliveries
            .iter()
            .rev()
            .find(|d| matches!(d.producer(), loomwork_core::delivery::Producer::Factory(p) if *p == factory_id))
            .and_then(|d| d.get::<T>())
            .cloned()
            .ok_or_else(|| Error::LookupMiss(format!("{runtime_type} from {factory_id}")))
    }

    /// Every delivery of runtime type `T`.
    pub async fn get_deliverable<T: 'static>(&self) -> Result<Vec<Delivery>> {
        let runtime_type = RuntimeType::of::<T>();
        let deliveries = self.dispatcher.find_by_type(runtime_type).await;
        if deliveries.is_empty() {
            return Err(Error::LookupMiss(runtime_type.to_string()));
        }
        Ok(deliveries)
    }

    pub fn dispatcher(&self) -> &Arc<DeliverableDispatcher> {
        &self.dispatcher
    }
}
