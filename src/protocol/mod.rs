//! Built-in protocol payloads
//!
//! Each protocol module owns the layouts of the payloads it places inside
//! VAAs and registers them through its `register` function. The global
//! [`payload_registry`](crate::payload_registry) runs
//! [`register_builtin_payloads`] once, on first access; private registries
//! can do the same with [`PayloadRegistry::with_builtin_protocols`].

pub mod automatic_token_bridge;
pub mod circle;
pub mod circle_integration;
pub mod governance;
pub mod ntt;
pub mod pyth;
pub mod relayer;
pub mod token_bridge;

use crate::error::Result;
use crate::payload::{PayloadLiteral, PayloadRegistry, PayloadSchema};

pub use circle::{BurnMessage, CircleMessage, DomainId};
pub use governance::{governance_action_id, governance_module, GovernanceModule};

/// Bare literal of the raw-bytes passthrough payload.
pub const RAW_PAYLOAD: &str = "Uint8Array";

/// Registers every built-in protocol payload into `registry`.
pub fn register_builtin_payloads(registry: &PayloadRegistry) -> Result<()> {
    registry.register(PayloadLiteral::bare(RAW_PAYLOAD), PayloadSchema::Raw)?;
    token_bridge::register(registry)?;
    automatic_token_bridge::register(registry)?;
    circle_integration::register(registry)?;
    circle::register(registry)?;
    ntt::register(registry)?;
    relayer::register(registry)?;
    pyth::register(registry)?;
    governance::register(registry)?;
    Ok(())
}
