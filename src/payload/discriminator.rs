use std::sync::Arc;

use tracing::trace;

use super::{PayloadLiteral, PayloadRegistry, PayloadSchema};
use crate::error::{Result, VaaError};

/// Recovers which registered payload a byte string is
///
/// A candidate matches when its layout decodes the whole input and every
/// fixed field checks out. Candidate schemas are resolved once, at
/// construction, so discrimination never touches the registry.
///
/// # Example
///
/// ```rust
/// use vaa_rs::{payload_registry, PayloadDiscriminator, PayloadLiteral};
///
/// let registry = payload_registry();
/// let discriminator = PayloadDiscriminator::for_protocols(&registry, &["TokenBridge"]).unwrap();
/// let mut attest_meta = vec![2u8];
/// attest_meta.extend([0u8; 32 + 2]);
/// attest_meta.push(6);
/// attest_meta.extend([0u8; 64]);
/// assert_eq!(
///     discriminator.discriminate(&attest_meta).unwrap(),
///     Some(PayloadLiteral::new("TokenBridge", "AttestMeta"))
/// );
/// ```
#[derive(Debug, Clone)]
pub struct PayloadDiscriminator {
    candidates: Vec<(PayloadLiteral, Arc<PayloadSchema>)>,
    allow_ambiguous: bool,
}

impl PayloadDiscriminator {
    /// Builds a discriminator over `literals`, failing if any is not registered.
    pub fn new(
        registry: &PayloadRegistry,
        literals: impl IntoIterator<Item = PayloadLiteral>,
    ) -> Result<Self> {
        let candidates = literals
            .into_iter()
            .map(|literal| {
                let schema = registry.get(&literal)?;
                Ok((literal, schema))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            candidates,
            allow_ambiguous: false,
        })
    }

    /// Builds a discriminator over every payload registered by `protocols`.
    pub fn for_protocols(registry: &PayloadRegistry, protocols: &[&str]) -> Result<Self> {
        let literals = protocols
            .iter()
            .flat_map(|protocol| registry.protocol_literals(protocol));
        Self::new(registry, literals)
    }

    /// Lets [`discriminate_all`](Self::discriminate_all) return every match
    /// instead of failing when more than one candidate fits.
    pub fn allow_ambiguous(mut self, allow: bool) -> Self {
        self.allow_ambiguous = allow;
        self
    }

    pub fn candidates(&self) -> impl Iterator<Item = &PayloadLiteral> {
        self.candidates.iter().map(|(literal, _)| literal)
    }

    /// Every candidate that structurally decodes `bytes`, in candidate order.
    pub fn matches(&self, bytes: &[u8]) -> Vec<PayloadLiteral> {
        let matches: Vec<_> = self
            .candidates
            .iter()
            .filter(|(_, schema)| schema.deserialize(bytes).is_ok())
            .map(|(literal, _)| literal.clone())
            .collect();
        trace!(
            candidates = self.candidates.len(),
            matches = matches.len(),
            event = "payload_discriminated"
        );
        matches
    }

    /// The single matching literal, `None` if nothing matches.
    ///
    /// More than one match is always an error here.
    pub fn discriminate(&self, bytes: &[u8]) -> Result<Option<PayloadLiteral>> {
        let mut matches = self.matches(bytes);
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(ambiguous(matches)),
        }
    }

    /// All matching literals; more than one is an error unless ambiguity is allowed.
    pub fn discriminate_all(&self, bytes: &[u8]) -> Result<Vec<PayloadLiteral>> {
        let matches = self.matches(bytes);
        if matches.len() > 1 && !self.allow_ambiguous {
            return Err(ambiguous(matches));
        }
        Ok(matches)
    }
}

fn ambiguous(matches: Vec<PayloadLiteral>) -> VaaError {
    VaaError::AmbiguousPayload {
        candidates: matches.iter().map(ToString::to_string).collect(),
    }
}
