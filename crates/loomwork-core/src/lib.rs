//! Loomwork core
//!
//! Domain vocabulary shared by every other crate in the workspace: the
//! typed delivery envelope, factory introspection, strongly-typed ids, the
//! error taxonomy, and the external collaborator port traits. This crate
//! has no knowledge of graphs or scheduling; that lives in `loomwork-graph`
//! and `loomwork-runtime`.

pub mod delivery;
pub mod error;
pub mod factory;
pub mod ids;
pub mod ports;

pub use delivery::{Delivery, RuntimeType};
pub use error::{Error, Result};
pub use factory::{AsyncFactory, Factory, FactoryDescriptor, InputSlot};
pub use ids::{DeliveryId, FactoryId};
