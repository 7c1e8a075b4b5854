//! Tracing span helpers for the async operations
//!
//! Span names are static (`vaa_rs.<operation>`), attributes are structured,
//! and every info-level span carries empty `error.*` fields that
//! [`record_error`] and [`record_error_with_context`] fill in on failure, plus
//! an `otel.status_code` flipped to `ERROR`.
//!
//! The transfer machinery attaches these spans itself; they are public for
//! callers wiring custom collaborators into the same trace tree.
//!
//! # Example
//!
//! ```rust
//! use tracing::Instrument;
//! use vaa_rs::{spans, Chain, UniversalAddress, WormholeMessageId};
//!
//! # async fn example() {
//! let id = WormholeMessageId {
//!     chain: Chain::Solana,
//!     emitter: UniversalAddress::ZERO,
//!     sequence: 1,
//! };
//! async {
//!     // fetch the VAA
//! }
//! .instrument(spans::get_vaa(&id, 5, 2))
//! .await;
//! # }
//! ```

use alloy_primitives::{B256, U256};
use tracing::Span;
use url::Url;

use crate::chain::ChainAddress;
use crate::transfer::TransactionId;
use crate::vaa::WormholeMessageId;

/// Span for polling a VAA until the guardians have signed it.
///
/// Parent: transfer operation span, if any
/// Children: provider request spans
#[inline]
pub fn get_vaa(id: &WormholeMessageId, max_attempts: u32, poll_interval_secs: u64) -> Span {
    tracing::info_span!(
        "vaa_rs.get_vaa",
        message_id = %id,
        max_attempts = max_attempts,
        poll_interval_secs = poll_interval_secs,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.source = tracing::field::Empty,
        error.context = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Span for polling Circle's attestation service.
#[inline]
pub fn get_circle_attestation(message_hash: &B256, max_attempts: u32, poll_interval_secs: u64) -> Span {
    tracing::info_span!(
        "vaa_rs.get_circle_attestation",
        message_hash = %message_hash,
        max_attempts = max_attempts,
        poll_interval_secs = poll_interval_secs,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.source = tracing::field::Empty,
        error.context = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Span for recovering messages from a source transaction.
#[inline]
pub fn parse_transaction(txid: &TransactionId) -> Span {
    tracing::info_span!(
        "vaa_rs.parse_transaction",
        chain = %txid.chain,
        txid = %txid.txid,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.source = tracing::field::Empty,
        error.context = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Span for sending the source chain side of a transfer.
///
/// Children: vaa_rs.parse_transaction
#[inline]
pub fn initiate_transfer(kind: &str, from: &ChainAddress, to: &ChainAddress, amount: &U256) -> Span {
    tracing::info_span!(
        "vaa_rs.initiate_transfer",
        transfer.kind = kind,
        from = %from,
        to = %to,
        amount = %amount,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.source = tracing::field::Empty,
        error.context = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Span for waiting on every attestation of a transfer.
///
/// Children: vaa_rs.get_vaa, vaa_rs.get_circle_attestation
#[inline]
pub fn fetch_attestation(kind: &str, attestations: usize) -> Span {
    tracing::info_span!(
        "vaa_rs.fetch_attestation",
        transfer.kind = kind,
        attestations = attestations,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.source = tracing::field::Empty,
        error.context = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Span for redeeming attestations on the destination chain.
#[inline]
pub fn complete_transfer(kind: &str, to: &ChainAddress, attestations: usize) -> Span {
    tracing::info_span!(
        "vaa_rs.complete_transfer",
        transfer.kind = kind,
        to = %to,
        attestations = attestations,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.source = tracing::field::Empty,
        error.context = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Span for one HTTP request to an attestation API.
#[inline]
pub fn http_request(method: &str, url: &Url) -> Span {
    tracing::trace_span!(
        "vaa_rs.http_request",
        http.method = method,
        http.url = %url,
    )
}

/// Records `error` on the current span.
///
/// `error.type` is the part of the message before the first colon, which for
/// [`VaaError`](crate::VaaError) is the variant's category.
pub fn record_error<E: std::error::Error>(error: &E) {
    let current_span = tracing::Span::current();
    let message = error.to_string();
    current_span.record(
        "error.type",
        message.split(':').next().unwrap_or("Unknown"),
    );
    current_span.record("error.message", message.as_str());
    current_span.record("otel.status_code", "ERROR");

    if let Some(source) = error.source() {
        current_span.record("error.source", source.to_string());
    }
}

/// Records an error described by hand on the current span.
pub fn record_error_with_context(
    error_type: &str,
    error_message: &str,
    additional_context: Option<&str>,
) {
    let current_span = tracing::Span::current();
    current_span.record("error.type", error_type);
    current_span.record("error.message", error_message);
    current_span.record("otel.status_code", "ERROR");

    if let Some(context) = additional_context {
        current_span.record("error.context", context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::error::VaaError;

    #[test]
    fn test_recording_without_subscriber_is_harmless() {
        let span = fetch_attestation("TokenTransfer", 2);
        let _guard = span.enter();
        record_error(&VaaError::AttestationTimeout { attempts: 5 });
        record_error_with_context("AttestationTimeout", "gave up", Some("after 30 seconds"));
    }

    #[test]
    fn test_spans_with_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter("vaa_rs=trace")
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let txid = TransactionId::new(Chain::Ethereum, "0x01");
            let span = parse_transaction(&txid);
            assert_eq!(
                span.metadata().map(|meta| meta.name()),
                Some("vaa_rs.parse_transaction")
            );
            let _guard = span.enter();
            record_error(&VaaError::Cancelled);
        });
    }
}
