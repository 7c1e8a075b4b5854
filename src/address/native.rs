//! Per-platform native address types and their registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use alloy_primitives::{hex, Address};
use once_cell::sync::Lazy;
use tracing::debug;

use super::UniversalAddress;
use crate::chain::Platform;
use crate::error::{Result, VaaError};

/// A chain-native address that can be turned back into universal form.
pub trait NativeAddress: fmt::Display + fmt::Debug + Send + Sync {
    fn platform(&self) -> Platform;

    fn to_universal(&self) -> UniversalAddress;
}

/// Builds the native address of one platform from a universal address.
pub type NativeAddressConstructor = fn(&UniversalAddress) -> Result<Box<dyn NativeAddress>>;

/// Registry of native address constructors keyed by platform
///
/// Registration is write-once per platform. Lookups for a platform nobody
/// registered fail with [`VaaError::UnsupportedPlatform`].
#[derive(Debug, Default)]
pub struct NativeAddressRegistry {
    constructors: RwLock<HashMap<Platform, NativeAddressConstructor>>,
}

impl NativeAddressRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the EVM, Solana, Aptos and Sui constructors.
    pub fn with_builtin_platforms() -> Self {
        let mut constructors: HashMap<Platform, NativeAddressConstructor> = HashMap::new();
        constructors.insert(Platform::Evm, EvmAddress::construct);
        constructors.insert(Platform::Solana, SolanaAddress::construct);
        constructors.insert(Platform::Aptos, |a| HexAddress32::construct(Platform::Aptos, a));
        constructors.insert(Platform::Sui, |a| HexAddress32::construct(Platform::Sui, a));
        Self {
            constructors: RwLock::new(constructors),
        }
    }

    pub fn register(&self, platform: Platform, constructor: NativeAddressConstructor) -> Result<()> {
        let mut constructors = self
            .constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if constructors.contains_key(&platform) {
            return Err(VaaError::PlatformAlreadyRegistered {
                platform: platform.to_string(),
            });
        }
        constructors.insert(platform, constructor);
        debug!(platform = %platform, event = "native_address_registered");
        Ok(())
    }

    pub fn is_registered(&self, platform: Platform) -> bool {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&platform)
    }

    pub fn to_native(
        &self,
        platform: Platform,
        address: &UniversalAddress,
    ) -> Result<Box<dyn NativeAddress>> {
        let constructor = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&platform)
            .copied()
            .ok_or_else(|| VaaError::UnsupportedPlatform {
                platform: platform.to_string(),
            })?;
        constructor(address)
    }

    /// Removes every registration. Intended for test isolation.
    pub fn clear(&self) {
        self.constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

static NATIVE_ADDRESSES: Lazy<NativeAddressRegistry> =
    Lazy::new(NativeAddressRegistry::with_builtin_platforms);

/// The process-wide native address registry, pre-populated with built-in platforms.
pub fn native_address_registry() -> &'static NativeAddressRegistry {
    &NATIVE_ADDRESSES
}

/// 20-byte EVM account, displayed EIP-55 checksummed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvmAddress(pub Address);

impl EvmAddress {
    fn construct(address: &UniversalAddress) -> Result<Box<dyn NativeAddress>> {
        Ok(Box::new(Self(address.to_evm_address()?)))
    }
}

impl NativeAddress for EvmAddress {
    fn platform(&self) -> Platform {
        Platform::Evm
    }

    fn to_universal(&self) -> UniversalAddress {
        self.0.into()
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_checksum(None))
    }
}

/// 32-byte Solana public key, displayed base58
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SolanaAddress(pub [u8; 32]);

impl SolanaAddress {
    fn construct(address: &UniversalAddress) -> Result<Box<dyn NativeAddress>> {
        Ok(Box::new(Self(address.to_bytes())))
    }
}

impl NativeAddress for SolanaAddress {
    fn platform(&self) -> Platform {
        Platform::Solana
    }

    fn to_universal(&self) -> UniversalAddress {
        UniversalAddress::new(self.0)
    }
}

impl fmt::Display for SolanaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

/// Full-width 32-byte hex account used by Move platforms (Aptos, Sui)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexAddress32 {
    platform: Platform,
    bytes: [u8; 32],
}

impl HexAddress32 {
    fn construct(platform: Platform, address: &UniversalAddress) -> Result<Box<dyn NativeAddress>> {
        Ok(Box::new(Self {
            platform,
            bytes: address.to_bytes(),
        }))
    }
}

impl NativeAddress for HexAddress32 {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn to_universal(&self) -> UniversalAddress {
        UniversalAddress::new(self.bytes)
    }
}

impl fmt::Display for HexAddress32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_prefixed(self.bytes))
    }
}
