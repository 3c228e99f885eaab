//! Sealing input shares to the aggregators that will process them.

use crate::Error;
use divviup_core::{
    DapVersion,
    hpke::{self, HpkeApplicationInfo, Label},
};
use divviup_messages::{HpkeCiphertext, HpkeConfig, InputShareAad, PlaintextInputShare, Role};
use prio::codec::Encode;
use zeroize::Zeroizing;

/// Encrypt one input share to the aggregator holding `receiver_role`, binding it to the report
/// through `aad`.
pub fn encrypt(
    input_share: &[u8],
    hpke_config: &HpkeConfig,
    receiver_role: &Role,
    aad: &InputShareAad,
    version: &DapVersion,
) -> Result<HpkeCiphertext, Error> {
    let plaintext_input_share = PlaintextInputShare::new(
        Vec::new(), // No extensions supported yet.
        input_share.to_vec(),
    );
    let plaintext = Zeroizing::new(plaintext_input_share.get_encoded()?);
    // Overwrite the message's copy of the input share.
    drop(Zeroizing::new(plaintext_input_share.into_payload()));

    hpke::seal(
        hpke_config,
        &HpkeApplicationInfo::new(version, &Label::InputShare, &Role::Client, receiver_role),
        &plaintext,
        &aad.get_encoded()?,
    )
    .map_err(Error::EncryptionFailed)
}
