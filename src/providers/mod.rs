//! Production implementations of the [`crate::traits`] seams.
//!
//! These talk to Wormholescan, Circle's Iris API, EVM nodes and the system
//! clock. Test code uses the fakes in [`crate::testing`] instead.
//!
//! API base URLs default per [`Network`] and can be overridden with the
//! `WORMHOLESCAN_API_URL` and `CIRCLE_IRIS_API_URL` environment variables
//! (a `.env` file is honored).

mod evm;
mod iris;
mod tokio_clock;
mod wormholescan;

use url::Url;

use crate::chain::Network;
use crate::error::{Result, VaaError};

pub use self::evm::{message_ids_from_logs, EvmChainContext};
pub use self::iris::IrisAttestationProvider;
pub use self::tokio_clock::TokioClock;
pub use self::wormholescan::WormholescanVaaProvider;

pub const WORMHOLESCAN_MAINNET_URL: &str = "https://api.wormholescan.io";
pub const WORMHOLESCAN_TESTNET_URL: &str = "https://api.testnet.wormholescan.io";
pub const CIRCLE_IRIS_PRODUCTION_URL: &str = "https://iris-api.circle.com";
pub const CIRCLE_IRIS_SANDBOX_URL: &str = "https://iris-api-sandbox.circle.com";

pub const ENV_WORMHOLESCAN_API_URL: &str = "WORMHOLESCAN_API_URL";
pub const ENV_CIRCLE_IRIS_API_URL: &str = "CIRCLE_IRIS_API_URL";

/// Wormholescan API of `network`, unless overridden in the environment.
pub fn wormholescan_url(network: Network) -> Result<Url> {
    let default = match network {
        Network::Mainnet => Some(WORMHOLESCAN_MAINNET_URL),
        Network::Testnet => Some(WORMHOLESCAN_TESTNET_URL),
        Network::Devnet => None,
    };
    resolve_url(env_override(ENV_WORMHOLESCAN_API_URL), default, ENV_WORMHOLESCAN_API_URL)
}

/// Circle Iris API of `network`, unless overridden in the environment.
pub fn circle_iris_url(network: Network) -> Result<Url> {
    let default = match network {
        Network::Mainnet => Some(CIRCLE_IRIS_PRODUCTION_URL),
        Network::Testnet => Some(CIRCLE_IRIS_SANDBOX_URL),
        Network::Devnet => None,
    };
    resolve_url(env_override(ENV_CIRCLE_IRIS_API_URL), default, ENV_CIRCLE_IRIS_API_URL)
}

fn env_override(key: &str) -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn resolve_url(override_url: Option<String>, default: Option<&str>, key: &str) -> Result<Url> {
    let raw = match (&override_url, default) {
        (Some(url), _) => url.as_str(),
        (None, Some(url)) => url,
        (None, None) => {
            return Err(VaaError::InvalidConfig(format!(
                "no default API for this network, set {key}"
            )))
        }
    };
    Url::parse(raw).map_err(|e| VaaError::InvalidConfig(format!("{key}={raw:?}: {e}")))
}

/// Joins `segments` onto `base` as path segments.
pub(crate) fn api_url<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| VaaError::InvalidConfig(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, Some(WORMHOLESCAN_MAINNET_URL), "https://api.wormholescan.io/")]
    #[case(
        Some("http://localhost:7071/api"),
        Some(WORMHOLESCAN_MAINNET_URL),
        "http://localhost:7071/api"
    )]
    #[case(Some("http://guardian:7071"), None, "http://guardian:7071/")]
    fn test_resolve_url(
        #[case] override_url: Option<&str>,
        #[case] default: Option<&str>,
        #[case] expected: &str,
    ) {
        let url = resolve_url(override_url.map(str::to_string), default, "TEST_URL").unwrap();
        assert_eq!(url.as_str(), expected);
    }

    #[test]
    fn test_devnet_needs_override() {
        let err = resolve_url(None, None, ENV_WORMHOLESCAN_API_URL).unwrap_err();
        insta::assert_snapshot!(err, @"Invalid configuration: no default API for this network, set WORMHOLESCAN_API_URL");
    }

    #[test]
    fn test_invalid_override() {
        let err = resolve_url(Some("not a url".to_string()), None, "TEST_URL").unwrap_err();
        assert!(matches!(err, VaaError::InvalidConfig(_)));
    }

    #[test]
    fn test_api_url_keeps_base_path() {
        let base = Url::parse("http://localhost:7071/api/").unwrap();
        let url = api_url(&base, ["v1", "signed_vaa", "2", "ab", "3"]).unwrap();
        insta::assert_snapshot!(url, @"http://localhost:7071/api/v1/signed_vaa/2/ab/3");
    }
}
