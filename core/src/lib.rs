#![cfg_attr(docsrs, feature(doc_cfg))]

use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    fmt::{self, Display, Formatter},
    str::FromStr,
};
use url::Url;

pub mod hpke;
pub mod http;
pub mod retries;
#[cfg(feature = "test-util")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_util;
pub mod time;
pub mod vdaf;

/// This value identifies the draft of DAP implemented by this crate. It is mixed into the HPKE
/// application info and the VDAF application context.
const DAP_09_IDENTIFIER: &str = "dap-09";

/// The version of DAP a task is pinned to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DapVersion {
    /// [draft-ietf-ppm-dap-09](https://datatracker.ietf.org/doc/draft-ietf-ppm-dap/09/)
    #[default]
    Dap09,
    /// A version identifier this crate does not implement. Tasks naming such a version are
    /// rejected when they are loaded into a client.
    Unsupported(String),
}

impl DapVersion {
    /// The identifier string for this version, as it appears in configuration and in the
    /// protocol's domain separation strings.
    pub fn identifier(&self) -> &str {
        match self {
            DapVersion::Dap09 => DAP_09_IDENTIFIER,
            DapVersion::Unsupported(identifier) => identifier,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, DapVersion::Unsupported(_))
    }
}

impl FromStr for DapVersion {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            DAP_09_IDENTIFIER => DapVersion::Dap09,
            _ => DapVersion::Unsupported(s.to_owned()),
        })
    }
}

impl From<String> for DapVersion {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(version) => version,
            Err(infallible) => match infallible {},
        }
    }
}

impl From<DapVersion> for String {
    fn from(value: DapVersion) -> Self {
        value.identifier().to_owned()
    }
}

impl Display for DapVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Returns the given [`Url`], possibly modified to end with a slash.
///
/// Aggregator endpoint URLs should end with a slash if they will be used with [`Url::join`],
/// because that method will drop the last path component of the base URL if it does not end with a
/// slash.
pub fn url_ensure_trailing_slash(mut url: Url) -> Url {
    if !url.as_str().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }
    url
}

/// Choose aws-lc-rs as the default rustls crypto provider. This is what's currently enabled by the
/// default Cargo feature. Specifying a default provider here prevents runtime errors if another
/// dependency also enables the ring feature.
pub fn initialize_rustls() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}
