//! Strongly-typed identifiers for domain entities.

use std::fmt;

/// Identifies the *class* of a factory (not an instance). Producer and
/// consumer scoping in the delivery model binds to the class, so this wraps
/// a stable string (the factory's Rust type name) rather than a generated
/// id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactoryId(String);

impl FactoryId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive a `FactoryId` from a concrete factory type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FactoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short disambiguating tag on a delivery or input slot. Empty by default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DeliveryId(String);

impl DeliveryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for DeliveryId {
    fn from(value: S) -> Self {
        Self::new(value)
    }
}
