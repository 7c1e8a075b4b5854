//! Chain-agnostic 32-byte addresses
//!
//! Every address that crosses a chain boundary is carried as a
//! [`UniversalAddress`]: 32 bytes, left-zero-padded when the native form is
//! shorter. Native forms are recovered through the per-platform constructors
//! in [`NativeAddressRegistry`].

mod native;

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{hex, Address, B256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512_256};

use crate::chain::Platform;
use crate::error::{Result, VaaError};

pub use native::{
    native_address_registry, EvmAddress, HexAddress32, NativeAddress, NativeAddressConstructor,
    NativeAddressRegistry, SolanaAddress,
};

/// Prefix hashed together with an Algorand application id to derive its address.
const ALGORAND_APP_ID_PREFIX: &[u8] = b"appID";

/// Textual encodings a [`UniversalAddress`] can be parsed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFormat {
    /// Hex string with or without `0x`, up to 32 bytes
    Hex,
    /// Base58 (Solana style)
    Base58,
    /// Bech32 with any human readable part (Cosmos style)
    Bech32,
    /// Decimal Algorand application id
    AlgorandAppId,
}

/// A 32-byte chain-agnostic address
///
/// # Example
///
/// ```rust
/// use vaa_rs::{AddressFormat, UniversalAddress};
///
/// let address = UniversalAddress::parse(
///     "98f3c9e6E3fAce36bAAd05FE09d375Ef1464288B",
///     AddressFormat::Hex,
/// ).unwrap();
/// assert_eq!(
///     address.to_string(),
///     "0x00000000000000000000000098f3c9e6e3face36baad05fe09d375ef1464288b"
/// );
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct UniversalAddress(B256);

impl UniversalAddress {
    pub const ZERO: Self = Self(B256::ZERO);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(B256::new(bytes))
    }

    /// Builds an address from up to 32 raw bytes, left-padding with zeros.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > 32 {
            return Err(VaaError::invalid_address(format!(
                "{} bytes do not fit in a universal address",
                bytes.len()
            )));
        }
        let mut padded = [0u8; 32];
        padded[32 - bytes.len()..].copy_from_slice(bytes);
        Ok(Self::new(padded))
    }

    /// Parses an address string in the given format.
    pub fn parse(s: &str, format: AddressFormat) -> Result<Self> {
        match format {
            AddressFormat::Hex => {
                let stripped = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                let bytes = hex::decode(stripped)?;
                Self::from_slice(&bytes)
            }
            AddressFormat::Base58 => {
                let bytes = bs58::decode(s)
                    .into_vec()
                    .map_err(|e| VaaError::invalid_address(format!("base58: {e}")))?;
                Self::from_slice(&bytes)
            }
            AddressFormat::Bech32 => {
                let (_hrp, bytes) = bech32::decode(s)
                    .map_err(|e| VaaError::invalid_address(format!("bech32: {e}")))?;
                Self::from_slice(&bytes)
            }
            AddressFormat::AlgorandAppId => {
                let app_id = s.parse::<u64>().map_err(|e| {
                    VaaError::invalid_address(format!("algorand app id {s:?}: {e}"))
                })?;
                Ok(Self::from_algorand_app_id(app_id))
            }
        }
    }

    /// Derives the address of an Algorand application: `sha512_256("appID" || id_be)`.
    pub fn from_algorand_app_id(app_id: u64) -> Self {
        let mut hasher = Sha512_256::new();
        hasher.update(ALGORAND_APP_ID_PREFIX);
        hasher.update(app_id.to_be_bytes());
        Self::new(hasher.finalize().into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 32] {
        self.0 .0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == B256::ZERO
    }

    /// Recovers the 20-byte EVM address, failing if the high 12 bytes are not zero.
    pub fn to_evm_address(&self) -> Result<Address> {
        let bytes = self.as_bytes();
        if bytes[..12].iter().any(|b| *b != 0) {
            return Err(VaaError::invalid_address(format!(
                "{self} is not a left-padded 20-byte address"
            )));
        }
        Ok(Address::from_slice(&bytes[12..]))
    }

    /// Converts to the native representation of `platform` using the
    /// process-wide native address registry.
    pub fn to_native(&self, platform: Platform) -> Result<Box<dyn NativeAddress>> {
        native_address_registry().to_native(platform, self)
    }
}

impl fmt::Display for UniversalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_prefixed(self.as_bytes()))
    }
}

impl fmt::Debug for UniversalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniversalAddress({self})")
    }
}

impl FromStr for UniversalAddress {
    type Err = VaaError;

    /// Parses a hex address; use [`UniversalAddress::parse`] for other formats.
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, AddressFormat::Hex)
    }
}

impl From<[u8; 32]> for UniversalAddress {
    fn from(bytes: [u8; 32]) -> Self {
        Self::new(bytes)
    }
}

impl From<B256> for UniversalAddress {
    fn from(word: B256) -> Self {
        Self(word)
    }
}

impl From<UniversalAddress> for B256 {
    fn from(address: UniversalAddress) -> Self {
        address.0
    }
}

impl From<Address> for UniversalAddress {
    fn from(address: Address) -> Self {
        Self(address.into_word())
    }
}

impl AsRef<[u8]> for UniversalAddress {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Serialize for UniversalAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for UniversalAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
