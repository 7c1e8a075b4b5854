use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use tracing::debug;

use super::{PayloadLiteral, PayloadSchema};
use crate::error::{Result, VaaError};
use crate::layout::Layout;

/// Write-once map from [`PayloadLiteral`] to [`PayloadSchema`]
///
/// Registering a literal twice fails, whichever thread gets there second.
/// Lookups never block writers for longer than a map access.
#[derive(Debug, Default)]
pub struct PayloadRegistry {
    schemas: RwLock<HashMap<PayloadLiteral, Arc<PayloadSchema>>>,
}

impl PayloadRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in protocol payload.
    pub fn with_builtin_protocols() -> Result<Self> {
        let registry = Self::new();
        crate::protocol::register_builtin_payloads(&registry)?;
        Ok(registry)
    }

    pub fn register(&self, literal: PayloadLiteral, schema: PayloadSchema) -> Result<()> {
        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        match schemas.entry(literal) {
            Entry::Occupied(entry) => Err(VaaError::PayloadAlreadyRegistered {
                literal: entry.key().to_string(),
            }),
            Entry::Vacant(entry) => {
                debug!(literal = %entry.key(), event = "payload_type_registered");
                entry.insert(Arc::new(schema));
                Ok(())
            }
        }
    }

    /// Registers `layout` under `protocol:name`.
    pub fn register_payload_type(&self, protocol: &str, name: &str, layout: Layout) -> Result<()> {
        self.register(PayloadLiteral::new(protocol, name), PayloadSchema::Layout(layout))
    }

    pub fn get(&self, literal: &PayloadLiteral) -> Result<Arc<PayloadSchema>> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(literal)
            .cloned()
            .ok_or_else(|| VaaError::PayloadNotRegistered {
                literal: literal.to_string(),
            })
    }

    pub fn contains(&self, literal: &PayloadLiteral) -> bool {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(literal)
    }

    /// Every registered literal, sorted.
    pub fn literals(&self) -> Vec<PayloadLiteral> {
        let mut literals: Vec<_> = self
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        literals.sort();
        literals
    }

    /// Registered literals of one protocol, sorted.
    pub fn protocol_literals(&self, protocol: &str) -> Vec<PayloadLiteral> {
        self.literals()
            .into_iter()
            .filter(|literal| literal.protocol() == Some(protocol))
            .collect()
    }

    /// Removes every registration. Intended for test isolation on private registries.
    pub fn clear(&self) {
        self.schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

static PAYLOADS: Lazy<Arc<PayloadRegistry>> = Lazy::new(|| {
    Arc::new(
        PayloadRegistry::with_builtin_protocols()
            .expect("built-in payload layouts register without conflicts"),
    )
});

/// The process-wide registry, populated with the built-in protocols on first use.
pub fn payload_registry() -> Arc<PayloadRegistry> {
    Arc::clone(&PAYLOADS)
}

/// Registers a payload layout in the process-wide registry.
pub fn register_payload_type(protocol: &str, name: &str, layout: Layout) -> Result<()> {
    PAYLOADS.register_payload_type(protocol, name, layout)
}

/// Looks up a payload schema in the process-wide registry.
pub fn get_payload_layout(literal: &PayloadLiteral) -> Result<Arc<PayloadSchema>> {
    PAYLOADS.get(literal)
}
