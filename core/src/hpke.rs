//! Encryption and decryption of messages using HPKE (RFC 9180).

use crate::DapVersion;
use divviup_messages::{HpkeCiphertext, HpkeConfig, Role};
use educe::Educe;
use hpke_dispatch::HpkeError;
#[cfg(any(test, feature = "test-util"))]
use {
    divviup_messages::{HpkeAeadId, HpkeConfigId, HpkeKdfId, HpkeKemId, HpkePublicKey},
    hpke_dispatch::{Kem, Keypair},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error occurred in the underlying HPKE library.
    #[error("HPKE error: {0}")]
    Hpke(#[from] HpkeError),
    /// The HPKE configuration names an algorithm that is not supported.
    #[error("invalid HPKE configuration: {0}")]
    InvalidConfiguration(&'static str),
}

fn hpke_dispatch_config_from_hpke_config(
    config: &HpkeConfig,
) -> Result<hpke_dispatch::Config, Error> {
    Ok(hpke_dispatch::Config {
        aead: u16::from(*config.aead_id())
            .try_into()
            .map_err(|_| Error::InvalidConfiguration("did not recognize aead"))?,
        kdf: u16::from(*config.kdf_id())
            .try_into()
            .map_err(|_| Error::InvalidConfiguration("did not recognize kdf"))?,
        kem: u16::from(*config.kem_id())
            .try_into()
            .map_err(|_| Error::InvalidConfiguration("did not recognize kem"))?,
    })
}

/// Determines whether the algorithms in the given HPKE configuration are supported for sealing
/// messages.
pub fn is_hpke_config_supported(config: &HpkeConfig) -> Result<(), Error> {
    hpke_dispatch_config_from_hpke_config(config)?;
    Ok(())
}

/// Labels incorporated into HPKE application info string
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Label {
    InputShare,
}

impl Label {
    /// Get the message-specific portion of the application info string for this label.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::InputShare => b"input share",
        }
    }
}

/// Application info used in HPKE context construction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HpkeApplicationInfo(Vec<u8>);

impl HpkeApplicationInfo {
    /// Construct HPKE application info from the protocol version, label and participant roles.
    pub fn new(
        version: &DapVersion,
        label: &Label,
        sender_role: &Role,
        recipient_role: &Role,
    ) -> Self {
        Self(
            [
                version.identifier().as_bytes(),
                b" ",
                label.as_bytes(),
                &[*sender_role as u8],
                &[*recipient_role as u8],
            ]
            .concat(),
        )
    }
}

impl AsRef<[u8]> for HpkeApplicationInfo {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An HPKE private key, serialized using the `SerializePrivateKey` function as
/// described in RFC 9180, §4 and §7.1.2.
#[derive(Clone, Educe, PartialEq, Eq)]
#[educe(Debug)]
pub struct HpkePrivateKey(#[educe(Debug(ignore))] Vec<u8>);

impl HpkePrivateKey {
    /// Construct a private key from its serialized form.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for HpkePrivateKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for HpkePrivateKey {
    fn from(v: Vec<u8>) -> Self {
        Self::new(v)
    }
}

/// An HPKE configuration and its corresponding private key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HpkeKeypair {
    config: HpkeConfig,
    private_key: HpkePrivateKey,
}

impl HpkeKeypair {
    /// Construct a keypair from its two halves.
    pub fn new(config: HpkeConfig, private_key: HpkePrivateKey) -> HpkeKeypair {
        HpkeKeypair {
            config,
            private_key,
        }
    }

    /// Retrieve the HPKE configuration from this keypair.
    pub fn config(&self) -> &HpkeConfig {
        &self.config
    }

    /// Retrieve the HPKE private key from this keypair.
    pub fn private_key(&self) -> &HpkePrivateKey {
        &self.private_key
    }

    /// Generate a throwaway X25519/HKDF-SHA256/AES-128-GCM keypair with a random config ID.
    #[cfg(any(test, feature = "test-util"))]
    #[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
    pub fn test() -> Self {
        Self::test_with_id(HpkeConfigId::from(rand::random::<u8>()))
    }

    /// Generate a throwaway X25519/HKDF-SHA256/AES-128-GCM keypair with the given config ID.
    #[cfg(any(test, feature = "test-util"))]
    #[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
    pub fn test_with_id(id: HpkeConfigId) -> Self {
        Self::test_with_algorithms(
            id,
            HpkeKemId::X25519HkdfSha256,
            HpkeKdfId::HkdfSha256,
            HpkeAeadId::Aes128Gcm,
        )
    }

    /// Generate a throwaway keypair for the given algorithm suite.
    #[cfg(any(test, feature = "test-util"))]
    #[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
    pub fn test_with_algorithms(
        id: HpkeConfigId,
        kem_id: HpkeKemId,
        kdf_id: HpkeKdfId,
        aead_id: HpkeAeadId,
    ) -> Self {
        let Keypair {
            private_key,
            public_key,
        } = Kem::try_from(u16::from(kem_id)).unwrap().gen_keypair();
        Self::new(
            HpkeConfig::new(
                id,
                kem_id,
                kdf_id,
                aead_id,
                HpkePublicKey::from(public_key),
            ),
            HpkePrivateKey::new(private_key),
        )
    }
}

/// Encrypt `plaintext` using the provided `recipient_config` and return the HPKE ciphertext. The
/// provided `application_info` and `associated_data` are cryptographically bound to the ciphertext
/// and are required to successfully decrypt it.
// An HPKE context can only be used once (we have no means of ensuring that sender and recipient
// "increment" nonces in lockstep), so this method creates a new HPKE context on each call.
pub fn seal(
    recipient_config: &HpkeConfig,
    application_info: &HpkeApplicationInfo,
    plaintext: &[u8],
    associated_data: &[u8],
) -> Result<HpkeCiphertext, Error> {
    let output = hpke_dispatch_config_from_hpke_config(recipient_config)?.base_mode_seal(
        recipient_config.public_key().as_ref(),
        application_info.as_ref(),
        plaintext,
        associated_data,
    )?;

    Ok(HpkeCiphertext::new(
        *recipient_config.id(),
        output.encapped_key,
        output.ciphertext,
    ))
}

/// Decrypt `ciphertext` using the provided `recipient_keypair`, and return the plaintext. The
/// `application_info` and `associated_data` must match what was provided to [`seal()`] exactly.
#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub fn open(
    recipient_keypair: &HpkeKeypair,
    application_info: &HpkeApplicationInfo,
    ciphertext: &HpkeCiphertext,
    associated_data: &[u8],
) -> Result<Vec<u8>, Error> {
    hpke_dispatch_config_from_hpke_config(recipient_keypair.config())?
        .base_mode_open(
            recipient_keypair.private_key().as_ref(),
            ciphertext.encapsulated_key(),
            application_info.as_ref(),
            ciphertext.payload(),
            associated_data,
        )
        .map_err(Into::into)
}
