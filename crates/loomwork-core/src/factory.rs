//! Factory introspection: the reflected view of a factory's declared
//! inputs and output, and the lifecycle contract factory authors implement.
//!
//! Rust has no runtime reflection over struct fields, so the "marked field
//! or single-argument setter" distinction collapses into one thing: a
//! factory author hand-writes `descriptor()` (the slot list) and
//! `assign_input()` (the slot-index-to-field assigner), the way a
//! `#[derive(Factory)]` macro would generate them if this workspace used
//! proc-macros. It doesn't, so the wiring is explicit.

use std::any::Any;
use std::collections::HashSet;

use crate::delivery::{Delivery, DeliverySignature, Producer, RuntimeType};
use crate::error::{Error, Result};
use crate::ids::{DeliveryId, FactoryId};

/// A declared input on a factory.
#[derive(Debug, Clone)]
pub struct InputSlot {
    pub runtime_type: RuntimeType,
    pub delivery_id: DeliveryId,
    /// `Producer::External` means "any producer".
    pub producer: Producer,
    pub consumer: FactoryId,
    pub optional: bool,
    pub auto_load: bool,
}

impl InputSlot {
    pub fn required(
        consumer: FactoryId,
        runtime_type: RuntimeType,
    ) -> Self {
        Self {
            runtime_type,
            delivery_id: DeliveryId::empty(),
            producer: Producer::External,
            consumer,
            optional: false,
            auto_load: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_delivery_id(mut self, id: impl Into<DeliveryId>) -> Self {
        self.delivery_id = id.into();
        self
    }

    pub fn with_producer(mut self, producer: FactoryId) -> Self {
        self.producer = Producer::Factory(producer);
        self
    }

    pub fn without_auto_load(mut self) -> Self {
        self.auto_load = false;
        self
    }

    /// Does `delivery` satisfy this slot?
    pub fn matches(&self, delivery: &Delivery) -> bool {
        self.matches_signature(&delivery.signature())
    }

    /// Same matching rule, against a [`DeliverySignature`] rather than a
    /// live [`Delivery`]. Used by graph inspection to match slots against
    /// not-yet-produced upstream outputs (see
    /// [`FactoryDescriptor::output_signature`]).
    pub fn matches_signature(&self, sig: &DeliverySignature) -> bool {
        if sig.runtime_type != self.runtime_type {
            return false;
        }
        if sig.delivery_id != self.delivery_id {
            return false;
        }
        let producer_ok = match &self.producer {
            Producer::External => true,
            Producer::Factory(expected) => sig.producer == Producer::Factory(expected.clone()),
        };
        if !producer_ok {
            return false;
        }
        sig.consumers.is_empty() || sig.consumers.contains(&self.consumer)
    }
}

/// A pure description derived once per factory instance.
#[derive(Debug, Clone)]
pub struct FactoryDescriptor {
    pub factory_id: FactoryId,
    pub output_type: RuntimeType,
    pub output_delivery_id: DeliveryId,
    pub output_consumers: HashSet<FactoryId>,
    pub inputs: Vec<InputSlot>,
}

impl FactoryDescriptor {
    pub fn new(factory_id: FactoryId, output_type: RuntimeType) -> Self {
        Self {
            factory_id,
            output_type,
            output_delivery_id: DeliveryId::empty(),
            output_consumers: HashSet::new(),
            inputs: Vec::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<InputSlot>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_output_delivery_id(mut self, id: impl Into<DeliveryId>) -> Self {
        self.output_delivery_id = id.into();
        self
    }

    pub fn with_output_consumers(mut self, consumers: impl IntoIterator<Item = FactoryId>) -> Self {
        self.output_consumers = consumers.into_iter().collect();
        self
    }

    /// The signature a delivery collected from this factory's output would
    /// carry, before the factory has ever run.
    pub fn output_signature(&self) -> DeliverySignature {
        DeliverySignature {
            runtime_type: self.output_type,
            delivery_id: self.output_delivery_id.clone(),
            producer: Producer::Factory(self.factory_id.clone()),
            consumers: self.output_consumers.clone(),
        }
    }

    /// Defensive validation: every input slot must declare itself as
    /// belonging to this factory.
    pub fn validate(&self) -> Result<()> {
        for slot in &self.inputs {
            if slot.consumer != self.factory_id {
                return Err(Error::InvalidDescriptor {
                    factory: self.factory_id.to_string(),
                    reason: format!(
                        "input slot {} is scoped to consumer {} but belongs to descriptor for {}",
                        slot.runtime_type, slot.consumer, self.factory_id
                    ),
                });
            }
        }
        Ok(())
    }
}

/// The lifecycle contract a factory author implements: `read`, `process`,
/// `write`, `get`.
pub trait Factory: Send {
    type Output: Send + Sync + 'static;

    /// Build this factory's descriptor. Called once per instance.
    fn descriptor(&self) -> FactoryDescriptor;

    /// Write the payload of `delivery` into the input slot at `slot_index`.
    /// `slot_index` indexes `self.descriptor().inputs`.
    fn assign_input(&mut self, slot_index: usize, delivery: &Delivery) -> Result<()>;

    /// Lifecycle steps report failure via `Result` so a user's I/O or
    /// validation errors surface as `Error::RuntimeFactoryFailure` rather
    /// than a panic.
    fn read(&mut self) -> Result<()> {
        Ok(())
    }
    fn process(&mut self) -> Result<()> {
        Ok(())
    }
    fn write(&mut self) -> Result<()> {
        Ok(())
    }

    fn get(&self) -> Self::Output;
}

/// Object-safe counterpart of [`Factory`], used by the runtime to hold
/// heterogeneous factories in one collection. Every `Factory` gets this for
/// free via the blanket impl below.
pub trait AnyFactory: Send {
    fn descriptor(&self) -> FactoryDescriptor;
    fn assign_input(&mut self, slot_index: usize, delivery: &Delivery) -> Result<()>;
    fn read(&mut self) -> Result<()>;
    fn process(&mut self) -> Result<()>;
    fn write(&mut self) -> Result<()>;
    fn take_output(&mut self) -> Box<dyn Any + Send + Sync>;
}

impl<F> AnyFactory for F
where
    F: Factory,
{
    fn descriptor(&self) -> FactoryDescriptor {
        Factory::descriptor(self)
    }

    fn assign_input(&mut self, slot_index: usize, delivery: &Delivery) -> Result<()> {
        Factory::assign_input(self, slot_index, delivery)
    }

    fn read(&mut self) -> Result<()> {
        Factory::read(self)
    }

    fn process(&mut self) -> Result<()> {
        Factory::process(self)
    }

    fn write(&mut self) -> Result<()> {
        Factory::write(self)
    }

    fn take_output(&mut self) -> Box<dyn Any + Send + Sync> {
        Box::new(Factory::get(self))
    }
}

/// Async-capable variant of [`Factory`] for factories whose `read`/`write`
/// need to perform I/O. Mirrors `Factory` but with async lifecycle methods;
/// the core dispatch loop remains synchronous, so an `AsyncFactory` is
/// driven by a small adapter in `loomwork-runtime` rather than by the core
/// dispatcher directly.
#[async_trait::async_trait]
pub trait AsyncFactory: Send {
    type Output: Send + Sync + 'static;

    fn descriptor(&self) -> FactoryDescriptor;
    fn assign_input(&mut self, slot_index: usize, delivery: &Delivery) -> Result<()>;

    async fn read(&mut self) -> Result<()> {
        Ok(())
    }
    async fn process(&mut self) -> Result<()> {
        Ok(())
    }
    async fn write(&mut self) -> Result<()> {
        Ok(())
    }

    fn get(&self) -> Self::Output;
}
