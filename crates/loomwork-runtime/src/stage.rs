//! Stage: an ordered group of factories runnable without internal
//! dependency.

use std::sync::Arc;

use loomwork_core::error::{Error, Result};
use loomwork_core::factory::AnyFactory;

use crate::dispatcher::DeliverableDispatcher;

/// One stage of the pipeline. `end` is `true` only on the last registered
/// stage; adding a new stage flips the previous stage's `end` to false.
pub struct Stage {
    pub stage_id: usize,
    pub factories: Vec<Box<dyn AnyFactory>>,
    pub parallel: bool,
    pub end: bool,
}

impl Stage {
    pub fn new(stage_id: usize) -> Self {
        Self {
            stage_id,
            factories: Vec::new(),
            parallel: false,
            end: true,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn push(&mut self, factory: Box<dyn AnyFactory>) {
        self.factories.push(factory);
    }

    /// Run every factory in this stage: dispatch, read, process, write,
    /// collect. Sequential unless `parallel` is set, in which case each
    /// factory runs on its own task. This is safe because the DAG forbids
    /// intra-stage dependencies, so no factory in this stage consumes
    /// another's output.
    #[tracing::instrument(skip(self, dispatcher), fields(stage_id = self.stage_id, parallel = self.parallel))]
    pub async fn run(&mut self, dispatcher: &Arc<DeliverableDispatcher>) -> Result<()> {
        if self.parallel {
            self.run_parallel(dispatcher).await
        } else {
            self.run_sequential(dispatcher).await
        }
    }

    async fn run_sequential(&mut self, dispatcher: &Arc<DeliverableDispatcher>) -> Result<()> {
        for factory in self.factories.iter_mut() {
            run_factory_lifecycle(dispatcher, factory.as_mut(), self.stage_id).await?;
        }
        Ok(())
    }

    async fn run_parallel(&mut self, dispatcher: &Arc<DeliverableDispatcher>) -> Result<()> {
        let mut set = tokio::task::JoinSet::new();
        let stage_id = self.stage_id;
        for (index, mut factory) in std::mem::take(&mut self.factories).into_iter().enumerate() {
            let dispatcher = Arc::clone(dispatcher);
            set.spawn(async move {
                let outcome = run_factory_lifecycle(&dispatcher, factory.as_mut(), stage_id).await;
                (index, outcome.map(|_| factory))
            });
        }

        let mut ordered: Vec<(usize, Box<dyn AnyFactory>)> = Vec::new();
        let mut first_error: Option<Error> = None;
        while let Some(joined) = set.join_next().await {
            let (index, outcome) =
                joined.map_err(|e| Error::Other(format!("stage task panicked: {e}")))?;
            match outcome {
                Ok(factory) => ordered.push((index, factory)),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        ordered.sort_by_key(|(index, _)| *index);
        self.factories = ordered.into_iter().map(|(_, f)| f).collect();
        Ok(())
    }
}

async fn run_factory_lifecycle(
    dispatcher: &DeliverableDispatcher,
    factory: &mut dyn AnyFactory,
    stage_id: usize,
) -> Result<()> {
    let wrap = |factory_name: String, e: Error| -> Error {
        if matches!(e, Error::RuntimeFactoryFailure { .. }) {
            e
        } else {
            Error::RuntimeFactoryFailure {
                stage: stage_id,
                factory: factory_name,
                source: Box::new(std::io::Error::other(e.to_string())),
            }
        }
    };

    dispatcher.dispatch(factory).await?;
    let descriptor = factory.descriptor();
    factory
        .read()
        .map_err(|e| wrap(descriptor.factory_id.to_string(), e))?;
    factory
        .process()
        .map_err(|e| wrap(descriptor.factory_id.to_string(), e))?;
    factory
        .write()
        .map_err(|e| wrap(descriptor.factory_id.to_string(), e))?;

    dispatcher
        .collect_deliverable(
            descriptor.factory_id.clone(),
            factory,
            descriptor.output_type,
            descriptor.output_delivery_id.clone(),
            descriptor.output_consumers.clone(),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use loomwork_core::delivery::{Delivery, RuntimeType};
    use loomwork_core::factory::{Factory, FactoryDescriptor, InputSlot};
    use loomwork_core::ids::FactoryId;

    struct Doubler {
        input: i32,
    }

    impl Factory for Doubler {
        type Output = i32;

        fn descriptor(&self) -> FactoryDescriptor {
            let id = FactoryId::of::<Doubler>();
            FactoryDescriptor::new(id.clone(), RuntimeType::of::<i32>())
                .with_inputs(vec![InputSlot::required(id, RuntimeType::of::<i32>())])
        }

        fn assign_input(&mut self, _slot_index: usize, delivery: &Delivery) -> Result<()> {
            self.input = *delivery.get::<i32>().unwrap();
            Ok(())
        }

        fn process(&mut self) -> Result<()> {
            self.input *= 2;
            Ok(())
        }

        fn get(&self) -> Self::Output {
            self.input
        }
    }

    #[tokio::test]
    async fn sequential_stage_runs_and_collects_output() {
        let dispatcher = Arc::new(DeliverableDispatcher::new());
        dispatcher
            .add_deliverable(Delivery::new(5i32))
            .await
            .unwrap();

        let mut stage = Stage::new(0);
        stage.push(Box::new(Doubler { input: 0 }));
        stage.run(&dispatcher).await.unwrap();

        let outputs = dispatcher.find_by_type(RuntimeType::of::<i32>()).await;
        assert!(outputs.iter().any(|d| *d.get::<i32>().unwrap() == 10));
    }

    #[tokio::test]
    async fn parallel_stage_runs_independent_factories() {
        let dispatcher = Arc::new(DeliverableDispatcher::new());
        dispatcher
            .add_deliverable(Delivery::new(1i32).with_consumers([FactoryId::of::<Doubler>()]))
            .await
            .unwrap();
        dispatcher
            .add_deliverable(
                Delivery::new(2i32)
                    .with_delivery_id("second")
                    .with_consumers([FactoryId::of::<Doubler>()]),
            )
            .await
            .unwrap();

        let mut stage = Stage::new(0).with_parallel(true);
        stage.push(Box::new(Doubler { input: 0 }));
        stage.run(&dispatcher).await.unwrap();
        assert_eq!(stage.factories.len(), 1);
    }
}
