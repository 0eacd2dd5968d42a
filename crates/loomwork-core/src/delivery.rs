//! The delivery model: a typed, optionally-tagged, producer/consumer-scoped
//! value envelope.

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub use crate::ids::DeliveryId;
use crate::ids::FactoryId;

/// The sentinel producer for pipeline-level seeded deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Producer {
    External,
    Factory(FactoryId),
}

impl fmt::Display for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Producer::External => write!(f, "External"),
            Producer::Factory(id) => write!(f, "{id}"),
        }
    }
}

/// A structural type token. Rust monomorphizes each generic instantiation
/// into its own concrete type, so `TypeId::of::<Container<Product1>>()` and
/// `TypeId::of::<Container<Product2>>()` are already distinct, capturing any
/// generic parameters with no hand-rolled reflection needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeType {
    type_id: TypeId,
    name: &'static str,
}

impl RuntimeType {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A typed envelope carrying a payload plus routing metadata.
///
/// Immutable once constructed: `runtime_type` never changes after
/// construction, and the builder methods consume and return `Self`.
#[derive(Clone)]
pub struct Delivery {
    payload: Arc<dyn Any + Send + Sync>,
    runtime_type: RuntimeType,
    delivery_id: DeliveryId,
    producer: Producer,
    consumers: HashSet<FactoryId>,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("runtime_type", &self.runtime_type)
            .field("delivery_id", &self.delivery_id)
            .field("producer", &self.producer)
            .field("consumers", &self.consumers)
            .finish_non_exhaustive()
    }
}

impl Delivery {
    /// Build a new delivery with empty consumers, default id, and
    /// `External` producer.
    pub fn new<T: Any + Send + Sync + 'static>(payload: T) -> Self {
        Self {
            payload: Arc::new(payload),
            runtime_type: RuntimeType::of::<T>(),
            delivery_id: DeliveryId::empty(),
            producer: Producer::External,
            consumers: HashSet::new(),
        }
    }

    /// Build a delivery from an already-boxed payload whose concrete type
    /// has been erased (the shape `AnyFactory::take_output` hands back),
    /// paired with the `runtime_type` the caller already knows from the
    /// producing factory's descriptor.
    pub fn from_boxed_any(payload: Box<dyn Any + Send + Sync>, runtime_type: RuntimeType) -> Self {
        Self {
            payload: Arc::from(payload),
            runtime_type,
            delivery_id: DeliveryId::empty(),
            producer: Producer::External,
            consumers: HashSet::new(),
        }
    }

    pub fn with_consumers(mut self, consumers: impl IntoIterator<Item = FactoryId>) -> Self {
        self.consumers = consumers.into_iter().collect();
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

    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    pub fn delivery_id(&self) -> &DeliveryId {
        &self.delivery_id
    }

    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    pub fn consumers(&self) -> &HashSet<FactoryId> {
        &self.consumers
    }

    /// Downcast the payload back to `T`. `None` if `T` does not match the
    /// delivery's runtime type.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Two deliveries are distinguishable iff their `(runtimeType,
    /// deliveryId, producer)` triples differ.
    pub fn identity_key(&self) -> (RuntimeType, &DeliveryId, &Producer) {
        (self.runtime_type, &self.delivery_id, &self.producer)
    }

    /// Strip the payload, keeping only the routing metadata used by the
    /// matching rule. The graph builder matches against signatures rather
    /// than live payloads so it can reason about not-yet-produced upstream
    /// outputs the same way it reasons about already-seeded deliveries.
    pub fn signature(&self) -> DeliverySignature {
        DeliverySignature {
            runtime_type: self.runtime_type,
            delivery_id: self.delivery_id.clone(),
            producer: self.producer.clone(),
            consumers: self.consumers.clone(),
        }
    }
}

/// The routing metadata of a [`Delivery`] without its payload. A producer's
/// *declared* output is representable as a signature before the producer
/// has ever run, which is what lets [`crate::factory::InputSlot::matches`]
/// be reused both for already-available deliveries and for not-yet-produced
/// upstream outputs during graph inspection.
#[derive(Debug, Clone)]
pub struct DeliverySignature {
    pub runtime_type: RuntimeType,
    pub delivery_id: DeliveryId,
    pub producer: Producer,
    pub consumers: HashSet<FactoryId>,
}
