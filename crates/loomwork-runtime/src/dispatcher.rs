//! The deliverable dispatcher: runtime registry of available deliveries.

use tokio::sync::RwLock;

use loomwork_core::delivery::{Delivery, RuntimeType};
use loomwork_core::error::{Error, Result};
use loomwork_core::factory::AnyFactory;
use loomwork_core::ids::FactoryId;

/// Registry guarded by a single `RwLock`: readers (`dispatch`,
/// `find_by_type`) take a shared lock, the writer (`collect`) takes an
/// exclusive one.
pub struct DeliverableDispatcher {
    registry: RwLock<Vec<Delivery>>,
}

impl Default for DeliverableDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliverableDispatcher {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Vec::new()),
        }
    }

    /// Append `delivery` to the registry. Duplicates of the same
    /// `(runtimeType, deliveryId, producer, consumers)` identity are
    /// rejected; a caller who wants to replace one must remove it first.
    #[tracing::instrument(skip(self, delivery), fields(runtime_type = %delivery.runtime_type()))]
    pub async fn add_deliverable(&self, delivery: Delivery) -> Result<()> {
        let mut registry = self.registry.write().await;
        let duplicate = registry.iter().any(|existing| {
            existing.identity_key() == delivery.identity_key()
                && existing.consumers() == delivery.consumers()
        });
        if duplicate {
            return Err(Error::Other(format!(
                "duplicate delivery for {} (id={:?}, producer={})",
                delivery.runtime_type(),
                delivery.delivery_id(),
                delivery.producer()
            )));
        }
        registry.push(delivery);
        Ok(())
    }

    /// Dispatch matching deliveries into `factory`'s declared input slots.
    /// Missing optional slots are skipped; a missing required slot is a
    /// fatal runtime error that should not occur if inspection passed.
    #[tracing::instrument(skip(self, factory))]
    pub async fn dispatch(&self, factory: &mut dyn AnyFactory) -> Result<()> {
        let descriptor = factory.descriptor();
        let registry = self.registry.read().await;
        for (slot_index, slot) in descriptor.inputs.iter().enumerate() {
            let matches: Vec<&Delivery> = registry
                .iter()
                .filter(|d| slot.matches(d))
                .collect();
            let chosen = best_of(&matches, slot.consumer.clone());
            match chosen {
                Some(delivery) => {
                    factory.assign_input(slot_index, delivery)?;
                }
                None if slot.optional => {}
                None => {
                    return Err(Error::UnsatisfiedInput {
                        slot_type: slot.runtime_type.to_string(),
                        delivery_id: slot.delivery_id.to_string(),
                        producer: None,
                        consumer: slot.consumer.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Take `factory.take_output()`, wrap it in a new [`Delivery`], and
    /// register it.
    #[tracing::instrument(skip(self, factory))]
    pub async fn collect_deliverable(
        &self,
        factory_id: FactoryId,
        factory: &mut dyn AnyFactory,
        output_type: RuntimeType,
        delivery_id: loomwork_core::ids::DeliveryId,
        consumers: std::collections::HashSet<FactoryId>,
    ) -> Result<()> {
        let payload = factory.take_output();
        let delivery = Delivery::from_boxed_any(payload, output_type)
            .with_producer(factory_id)
            .with_delivery_id(delivery_id)
            .with_consumers(consumers);
        self.add_deliverable(delivery).await
    }

    /// All deliveries whose runtime type matches `runtime_type`, used by
    /// `Pipeline::get_deliverable`.
    pub async fn find_by_type(&self, runtime_type: RuntimeType) -> Vec<Delivery> {
        self.registry
            .read()
            .await
            .iter()
            .filter(|d| d.runtime_type() == runtime_type)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Tie-break among dispatch-time matches: consumer-specific over
/// any-consumer, most-recently-registered among equal specificity.
/// Inspection already guarantees this never needs to fall through to "pick
/// the first" on a validated pipeline, but the rule is applied in full here
/// for symmetry with dynamically-added deliveries.
fn best_of<'a>(matches: &[&'a Delivery], consumer: FactoryId) -> Option<&'a Delivery> {
    if matches.is_empty() {
        return None;
    }
    let specific: Vec<&&Delivery> = matches
        .iter()
        .filter(|d| d.consumers().contains(&consumer))
        .collect();
    let pool = if !specific.is_empty() {
        specific
    } else {
        matches.iter().collect()
    };
    pool.into_iter().last().copied()
}
