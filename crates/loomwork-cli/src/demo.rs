//! A small demo pipeline exercising the chained string → product →
//! container scenario, wired up for the `describe`/`run` subcommands.

use loomwork_core::delivery::{Delivery, RuntimeType};
use loomwork_core::error::Result;
use loomwork_core::factory::{Factory, FactoryDescriptor, InputSlot};
use loomwork_core::ids::FactoryId;
use loomwork_runtime::{Pipeline, Stage};

#[derive(Debug, Clone, PartialEq)]
pub struct Product1 {
    pub x: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product2 {
    pub x: String,
    pub y: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container<T> {
    pub inner: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container2<T> {
    pub inner: T,
}

/// `String -> Product1`.
pub struct F1 {
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
        self.input = delivery.get::<String>().expect("String payload").clone();
        Ok(())
    }

    fn get(&self) -> Self::Output {
        Product1 {
            x: self.input.clone(),
        }
    }
}

/// `() -> Product2`, no declared inputs.
pub struct F2;

impl Factory for F2 {
    type Output = Product2;

    fn descriptor(&self) -> FactoryDescriptor {
        FactoryDescriptor::new(FactoryId::of::<F2>(), RuntimeType::of::<Product2>())
    }

    fn assign_input(&mut self, slot_index: usize, _delivery: &Delivery) -> Result<()> {
        unreachable!("F2 declares no input slots, got slot_index={slot_index}")
    }

    fn get(&self) -> Self::Output {
        Product2 {
            x: "a".to_string(),
            y: "b".to_string(),
        }
    }
}

/// `Product1 -> Container<Product1>`.
pub struct F3 {
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
        self.input = delivery.get::<Product1>().expect("Product1 payload").clone();
        Ok(())
    }

    fn get(&self) -> Self::Output {
        Container {
            inner: self.input.clone(),
        }
    }
}

/// `Product2 -> Container2<Product2>`, assigned through a setter-shaped
/// `assign_input` rather than a marked field. Both forms compile to the
/// same `Factory::assign_input` call in this workspace.
pub struct F4 {
    product2: Option<Product2>,
}

impl F4 {
    fn set_product2(&mut self, value: Product2) {
        self.product2 = Some(value);
    }
}

impl Factory for F4 {
    type Output = Container2<Product2>;

    fn descriptor(&self) -> FactoryDescriptor {
        let id = FactoryId::of::<F4>();
        FactoryDescriptor::new(id.clone(), RuntimeType::of::<Container2<Product2>>()).with_inputs(
            vec![InputSlot::required(id, RuntimeType::of::<Product2>())],
        )
    }

    fn assign_input(&mut self, _slot_index: usize, delivery: &Delivery) -> Result<()> {
        self.set_product2(delivery.get::<Product2>().expect("Product2 payload").clone());
        Ok(())
    }

    fn get(&self) -> Self::Output {
        Container2 {
            inner: self.product2.clone().expect("assigned before get()"),
        }
    }
}

/// Build the S1 scenario pipeline: `{F1, F2}`, `{F3}`, `{F4}`, seeded with
/// `String = "id_of_product1"`.
pub fn build_demo_pipeline() -> Result<Pipeline> {
    let mut pipeline = Pipeline::new();
    pipeline.set_input(Delivery::new("id_of_product1".to_string()))?;

    let mut first_stage = Stage::new(0);
    first_stage.push(Box::new(F1 {
        input: String::new(),
    }));
    first_stage.push(Box::new(F2));
    pipeline.add_stage(first_stage)?;

    pipeline.add_factory(Box::new(F3 {
        input: Product1 { x: String::new() },
    }))?;
    pipeline.add_factory(Box::new(F4 { product2: None }))?;

    Ok(pipeline)
}
