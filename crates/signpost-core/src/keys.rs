//! Signing-key provisioning.
//!
//! The deployment's single Ed25519 keypair lives under a fixed key in the
//! keys partition. It is provisioned lazily on the first token operation
//! with create-if-absent semantics: when two cold instances race, exactly
//! one conditional put wins and the loser adopts the stored pair, so every
//! issued token stays verifiable.

use signpost_crypto::{EncodedKeyPair, TokenKeyPair};
use tracing::{error, info};

use crate::error::SignupError;
use crate::store::{KeyValueStore, Partition};

/// Fixed store key of the deployment keypair.
pub const KEY_PAIR_STORE_KEY: &str = "keys";

/// Fetch the deployment keypair, generating and persisting it if absent.
pub async fn get_or_create_key_pair<S: KeyValueStore>(
    store: &S,
) -> Result<TokenKeyPair, SignupError> {
    if let Some(encoded) = store
        .get::<EncodedKeyPair>(Partition::Keys, KEY_PAIR_STORE_KEY)
        .await?
    {
        return decode(&encoded);
    }

    let pair = TokenKeyPair::generate();
    let encoded = pair.to_encoded();
    if store
        .compare_and_swap(Partition::Keys, KEY_PAIR_STORE_KEY, None, &encoded)
        .await?
    {
        info!("generated new token signing keypair");
        return Ok(pair);
    }

    // Lost the creation race; adopt the winner's pair.
    let encoded = store
        .get::<EncodedKeyPair>(Partition::Keys, KEY_PAIR_STORE_KEY)
        .await?
        .ok_or_else(|| {
            error!("keypair vanished after losing creation race");
            SignupError::Internal
        })?;
    decode(&encoded)
}

fn decode(encoded: &EncodedKeyPair) -> Result<TokenKeyPair, SignupError> {
    TokenKeyPair::from_encoded(encoded).map_err(|e| {
        error!(error = %e, "failed to decode persisted keypair");
        SignupError::Internal
    })
}
