//! End-to-end pipeline scenarios.

use loomwork_core::delivery::{Delivery, RuntimeType};
use loomwork_core::error::{Error, Result};
use loomwork_core::factory::{Factory, FactoryDescriptor, InputSlot};
use loomwork_core::ids::FactoryId;
use loomwork_graph::{IdentityOptimizer, MergeIndependentStages};
use loomwork_runtime::{CancelToken, Pipeline, Stage};
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, PartialEq)]
struct Product1 {
    x: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Product2 {
    x: String,
    y: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Container<T> {
    inner: T,
}

#[derive(Debug, Clone, PartialEq)]
struct Container2<T> {
    inner: T,
}

struct F1 {
    input: String,
}

impl Factory for F1 {
    type Output = Product1;

    fn descriptor(&self) -> FactoryDescriptor {
        let id = FactoryId::of::<F1>();
        FactoryDescriptor::new(id.clone(), RuntimeType::of::<Product1>())
            .with_inputs(vec![InputSlot::required(id, RuntimeType::of::<String>())])
    }

    fn assign_input(&mut self, _slot_index: usize, delivery: &Delivery) -> Result<()> {
        self.input = delivery.get::<String>().unwrap().clone();
        Ok(())
    }

    fn get(&self) -> Self::Output {
        Product1 {
            x: self.input.clone(),
        }
    }
}

struct F2;

impl Factory for F2 {
    type Output = Product2;

    fn descriptor(&self) -> FactoryDescriptor {
        FactoryDescriptor::new(FactoryId::of::<F2>(), RuntimeType::of::<Product2>())
    }

    fn assign_input(&mut self, _slot_index: usize, _delivery: &Delivery) -> Result<()> {
        unreachable!("F2 has no input slots")
    }

    fn get(&self) -> Self::Output {
        Product2 {
            x: "a".to_string(),
            y: "b".to_string(),
        }
    }
}

struct F3 {
    input: Product1,
}

impl Factory for F3 {
    type Output = Container<Product1>;

    fn descriptor(&self) -> FactoryDescriptor {
        let id = FactoryId::of::<F3>();
        FactoryDescriptor::new(id.clone(), RuntimeType::of::<Container<Product1>>()).with_inputs(
            vec![InputSlot::required(id, RuntimeType::of::<Product1>())],
        )
    }

    fn assign_input(&mut self, _slot_index: usize, delivery: &Delivery) -> Result<()> {
        self.input = delivery.get::<Product1>().unwrap().clone();
        Ok(())
    }

    fn get(&self) -> Self::Output {
        Container {
            inner: self.input.clone(),
        }
    }
}

struct F4 {
    input: Product2,
}

impl Factory for F4 {
    type Output = Container2<Product2>;

    fn descriptor(&self) -> FactoryDescriptor {
        let id = FactoryId::of::<F4>();
        FactoryDescriptor::new(id.clone(), RuntimeType::of::<Container2<Product2>>())
            .with_inputs(vec![InputSlot::required(
                id,
                RuntimeType::of::<Product2>(),
            )])
    }

    fn assign_input(&mut self, _slot_index: usize, delivery: &Delivery) -> Result<()> {
        self.input = delivery.get::<Product2>().unwrap().clone();
        Ok(())
    }

    fn get(&self) -> Self::Output {
        Container2 {
            inner: self.input.clone(),
        }
    }
}

fn s1_pipeline() -> Pipeline {
    let mut pipeline = Pipeline::new();
    pipeline
        .set_input(Delivery::new("id_of_product1".to_string()))
        .unwrap();

    let mut first_stage = Stage::new(0);
    first_stage.push(Box::new(F1 {
        input: String::new(),
    }));
    first_stage.push(Box::new(F2));
    pipeline.add_stage(first_stage).unwrap();

    pipeline
        .add_factory(Box::new(F3 {
            input: Product1 { x: String::new() },
        }))
        .unwrap();
    pipeline
        .add_factory(Box::new(F4 {
            input: Product2 {
                x: String::new(),
                y: String::new(),
            },
        }))
        .unwrap();

    pipeline
}

#[tokio::test]
async fn s1_chained_string_to_product_to_container() {
    let mut pipeline = s1_pipeline();
    pipeline.run(&CancelToken::new()).await.unwrap();

    assert!(pipeline.dispatcher().len().await >= 5);

    let containers = pipeline
        .get_deliverable::<Container2<Product2>>()
        .await
        .unwrap();
    assert_eq!(containers.len(), 1);
    assert_eq!(
        *containers[0].get::<Container2<Product2>>().unwrap(),
        Container2 {
            inner: Product2 {
                x: "a".to_string(),
                y: "b".to_string(),
            }
        }
    );
}

#[tokio::test]
async fn s2_consumer_scoped_disambiguation() {
    let mut pipeline = Pipeline::new();
    pipeline
        .set_input(Delivery::new("wrong".to_string()))
        .unwrap();
    pipeline
        .set_input(
            Delivery::new("id_of_product1".to_string()).with_consumers([FactoryId::of::<F1>()]),
        )
        .unwrap();
    pipeline
        .add_factory(Box::new(F1 {
            input: String::new(),
        }))
        .unwrap();

    pipeline.run(&CancelToken::new()).await.unwrap();

    let out: Product1 = pipeline.get_output::<F1, Product1>().await.unwrap();
    assert_eq!(out.x, "id_of_product1");
}

#[tokio::test]
async fn s3_inspection_rejects_missing_input() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_factory(Box::new(F3 {
            input: Product1 { x: String::new() },
        }))
        .unwrap();

    let err = pipeline.run(&CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::UnsatisfiedInput { .. }));
}

#[tokio::test]
async fn s4_inspection_rejects_ambiguity() {
    let mut pipeline = Pipeline::new();
    pipeline.set_input(Delivery::new("a".to_string())).unwrap();
    pipeline.set_input(Delivery::new("b".to_string())).unwrap();
    pipeline
        .add_factory(Box::new(F1 {
            input: String::new(),
        }))
        .unwrap();

    let err = pipeline.run(&CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::AmbiguousDelivery { .. }));
}

#[tokio::test]
async fn s5_generic_parameters_are_distinct_types() {
    let mut pipeline = Pipeline::new();
    pipeline
        .set_input(Delivery::new(Container {
            inner: Product1 { x: "p1".to_string() },
        }))
        .unwrap();

    struct NeedsContainerOfProduct2 {
        input: Container<Product2>,
    }
    impl Factory for NeedsContainerOfProduct2 {
        type Output = ();

        fn descriptor(&self) -> FactoryDescriptor {
            let id = FactoryId::of::<NeedsContainerOfProduct2>();
            FactoryDescriptor::new(id.clone(), RuntimeType::of::<()>()).with_inputs(vec![
                InputSlot::required(id, RuntimeType::of::<Container<Product2>>()),
            ])
        }

        fn assign_input(&mut self, _slot_index: usize, delivery: &Delivery) -> Result<()> {
            self.input = delivery.get::<Container<Product2>>().unwrap().clone();
            Ok(())
        }

        fn get(&self) -> Self::Output {}
    }

    pipeline
        .add_factory(Box::new(NeedsContainerOfProduct2 {
            input: Container {
                inner: Product2 {
                    x: String::new(),
                    y: String::new(),
                },
            },
        }))
        .unwrap();

    let err = pipeline.run(&CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::UnsatisfiedInput { .. }));
}

#[tokio::test]
async fn s6_optimizer_preserves_final_outputs() {
    let with_identity = {
        let mut pipeline = s1_pipeline().with_optimizer(Box::new(IdentityOptimizer));
        pipeline.run(&CancelToken::new()).await.unwrap();
        pipeline
            .get_last_output::<Container2<Product2>>()
            .await
            .unwrap()
    };

    let with_merge = {
        let mut pipeline = s1_pipeline().with_optimizer(Box::new(MergeIndependentStages));
        pipeline.run(&CancelToken::new()).await.unwrap();
        pipeline
            .get_last_output::<Container2<Product2>>()
            .await
            .unwrap()
    };

    assert_eq!(with_identity, with_merge);
}
