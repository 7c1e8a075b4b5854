//! Governance payloads
//!
//! Every governance message starts with the same header: the target module
//! name as 32 bytes of right-aligned ASCII, a one-byte action id, and the
//! chain the action applies to (`0` meaning every chain, decoded as
//! [`Value::Null`](crate::layout::Value::Null)).
//!
//! The module and action tables are part of the wire contract: contracts
//! compare both byte for byte, so a wrong entry produces VAAs that verify but
//! are rejected on chain.

use std::fmt;

use crate::error::Result;
use crate::layout::{
    amount_item, chain_item, chain_or_any_item, field, fixed_string_item, universal_address_item,
    Alignment, Item, Layout, LengthSpec,
};
use crate::payload::{PayloadLiteral, PayloadRegistry};

/// Contract module addressed by a governance message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GovernanceModule {
    WormholeCore,
    TokenBridge,
    NftBridge,
    Relayer,
    CircleIntegration,
    IbcReceiver,
    IbcTranslator,
}

impl GovernanceModule {
    pub const ALL: [GovernanceModule; 7] = [
        Self::WormholeCore,
        Self::TokenBridge,
        Self::NftBridge,
        Self::Relayer,
        Self::CircleIntegration,
        Self::IbcReceiver,
        Self::IbcTranslator,
    ];

    /// Protocol the module's actions are registered under.
    pub const fn protocol(self) -> &'static str {
        match self {
            Self::WormholeCore => "WormholeCore",
            Self::TokenBridge => "TokenBridge",
            Self::NftBridge => "NftBridge",
            Self::Relayer => "Relayer",
            Self::CircleIntegration => "CircleIntegration",
            Self::IbcReceiver => "IbcReceiver",
            Self::IbcTranslator => "IbcTranslator",
        }
    }

    /// Module name as written on the wire.
    pub const fn module_name(self) -> &'static str {
        match self {
            Self::WormholeCore => "Core",
            Self::TokenBridge => "TokenBridge",
            Self::NftBridge => "NFTBridge",
            Self::Relayer => "WormholeRelayer",
            Self::CircleIntegration => "CircleIntegration",
            Self::IbcReceiver => "IbcReceiver",
            Self::IbcTranslator => "IbcTranslator",
        }
    }

    /// The 32-byte module field, name right-aligned and zero-padded on the left.
    pub fn module_bytes(self) -> [u8; 32] {
        let name = self.module_name().as_bytes();
        let mut bytes = [0u8; 32];
        bytes[32 - name.len()..].copy_from_slice(name);
        bytes
    }

    /// `(action, id)` pairs accepted by the module's contracts.
    pub const fn actions(self) -> &'static [(&'static str, u8)] {
        match self {
            Self::WormholeCore => &[
                ("UpgradeContract", 1),
                ("GuardianSetUpgrade", 2),
                ("SetMessageFee", 3),
                ("TransferFees", 4),
                ("RecoverChainId", 5),
            ],
            Self::TokenBridge | Self::NftBridge => &[
                ("RegisterChain", 1),
                ("UpgradeContract", 2),
                ("RecoverChainId", 3),
            ],
            Self::Relayer => &[
                ("RegisterChain", 1),
                ("UpgradeContract", 2),
                ("UpdateDefaultProvider", 3),
            ],
            Self::CircleIntegration => &[
                ("UpdateFinality", 1),
                ("RegisterEmitterAndDomain", 2),
                ("UpgradeContract", 3),
            ],
            Self::IbcReceiver | Self::IbcTranslator => &[("UpdateChannelChain", 1)],
        }
    }

    pub fn action_id(self, action: &str) -> Option<u8> {
        self.actions()
            .iter()
            .find(|(name, _)| *name == action)
            .map(|(_, id)| *id)
    }

    pub fn from_protocol(protocol: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|module| module.protocol() == protocol)
    }

    /// Full layout of `action`: governance header followed by the action body.
    pub fn action_layout(self, action: &str) -> Option<Layout> {
        let id = self.action_id(action)?;
        let header = Layout::new(vec![
            field("module", Item::bytes(32).fixed(self.module_bytes())),
            field("action", Item::uint(1).fixed(id)),
            field("chain", chain_or_any_item()),
        ]);
        Some(header.extend(action_body(action)))
    }
}

impl fmt::Display for GovernanceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.module_name())
    }
}

/// On-chain module name of the governance module registered under `protocol`.
pub fn governance_module(protocol: &str) -> Option<&'static str> {
    GovernanceModule::from_protocol(protocol).map(GovernanceModule::module_name)
}

/// Numeric id of `action` in the governance module registered under `protocol`.
pub fn governance_action_id(protocol: &str, action: &str) -> Option<u8> {
    GovernanceModule::from_protocol(protocol)?.action_id(action)
}

fn action_body(action: &str) -> Layout {
    let fields = match action {
        "UpgradeContract" => vec![field("newContract", universal_address_item())],
        "GuardianSetUpgrade" => vec![
            field("guardianSet", Item::uint(4)),
            field(
                "guardians",
                Item::array(LengthSpec::prefixed(1), Item::bytes(20)),
            ),
        ],
        "SetMessageFee" => vec![field("fee", amount_item())],
        "TransferFees" => vec![
            field("amount", amount_item()),
            field("recipient", universal_address_item()),
        ],
        "RecoverChainId" => vec![
            field("evmChainId", amount_item()),
            field("newChainId", chain_item()),
        ],
        "RegisterChain" => vec![
            field("foreignChain", chain_item()),
            field("foreignAddress", universal_address_item()),
        ],
        "UpdateDefaultProvider" => vec![field("newProvider", universal_address_item())],
        "UpdateFinality" => vec![field("finality", Item::uint(1))],
        "RegisterEmitterAndDomain" => vec![
            field("foreignChain", chain_item()),
            field("foreignEmitter", universal_address_item()),
            field("circleDomain", Item::uint(4)),
        ],
        "UpdateChannelChain" => vec![
            field("channelId", fixed_string_item(64, Alignment::Right)),
            field("channelChain", chain_item()),
        ],
        _ => Vec::new(),
    };
    Layout::new(fields)
}

pub(crate) fn register(registry: &PayloadRegistry) -> Result<()> {
    for module in GovernanceModule::ALL {
        for (action, _) in module.actions() {
            if let Some(layout) = module.action_layout(action) {
                registry.register(
                    PayloadLiteral::new(module.protocol(), *action),
                    crate::payload::PayloadSchema::Layout(layout),
                )?;
            }
        }
    }
    Ok(())
}
