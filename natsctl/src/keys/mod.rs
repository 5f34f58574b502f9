//! Key & Claim Factory.
//!
//! Generates nkey pairs for the three entity tiers, builds the matching NATS
//! claim, and signs it with the correct parent seed. JWT encoding is
//! hand-rolled (header/claims/signature, base64url, `alg: "ed25519-nkey"`)
//! since NATS's nkey-signed claims aren't a standard JWS algorithm.

pub mod claims;
pub mod creds;

use nkeys::KeyPair;
use serde::Serialize;

use crate::error::{Error, Result};

/// A generated Ed25519 key pair, flattened to the three fields persisted on
/// every entity row.
#[derive(Debug, Clone)]
pub struct GeneratedKeyPair {
    pub public_key: String,
    pub private_key: String,
    pub seed: String,
}

/// nkeys doesn't expose a separate "private key" accessor distinct from the
/// seed for Ed25519 pairs (the seed already encodes the private scalar), so
/// `private_key` mirrors the seed. Kept as a distinct persisted field to
/// match the four-column layout (`public_key`/`private_key`/`seed`/`jwt`)
/// carried by every entity row.
fn materialize(kp: KeyPair) -> Result<GeneratedKeyPair> {
    let public_key = kp.public_key();
    let seed = kp.seed()?;
    Ok(GeneratedKeyPair {
        public_key,
        private_key: seed.clone(),
        seed,
    })
}

pub struct OperatorMaterial {
    pub primary: GeneratedKeyPair,
    pub signing: GeneratedKeyPair,
    pub jwt: String,
}

pub struct AccountMaterial {
    pub primary: GeneratedKeyPair,
    pub signing: GeneratedKeyPair,
    pub jwt: String,
}

pub struct UserMaterial {
    pub kp: GeneratedKeyPair,
    pub jwt: String,
    pub creds: String,
}

/// Generate a fresh operator: primary + signing key pair, JWT self-signed
/// with the primary key, signing key listed in `signing_keys`.
pub fn make_operator(url: &str) -> Result<OperatorMaterial> {
    let primary_kp = KeyPair::new_operator();
    let signing_kp = KeyPair::new_operator();

    let primary = materialize(primary_kp)?;
    let signing = materialize(signing_kp)?;

    let claims = claims::OperatorClaims::new(&primary.public_key, url, &signing.public_key);
    let signer = KeyPair::from_seed(&primary.seed)?;
    let jwt = sign_claims(&claims, &signer)?;

    Ok(OperatorMaterial {
        primary,
        signing,
        jwt,
    })
}

/// Generate a fresh account under `operator_signing_seed`. `SYS` accounts
/// embed the two monitoring exports and ignore `limits`; all others embed
/// `limits` verbatim.
pub fn make_account(
    operator_signing_seed: &str,
    name: &str,
    limits: &claims::OperatorLimits,
) -> Result<AccountMaterial> {
    let primary_kp = KeyPair::new_account();
    let signing_kp = KeyPair::new_account();

    let primary = materialize(primary_kp)?;
    let signing = materialize(signing_kp)?;

    let claims = if name == "SYS" {
        claims::AccountClaims::new_sys(&primary.public_key, name, &signing.public_key)
    } else {
        claims::AccountClaims::new(&primary.public_key, name, &signing.public_key, limits.clone())
    };

    let signer = KeyPair::from_seed(operator_signing_seed)?;
    let jwt = sign_claims(&claims, &signer)?;

    Ok(AccountMaterial {
        primary,
        signing,
        jwt,
    })
}

/// Generate a fresh user under `account_signing_seed`. `IssuerAccount` is set
/// to `account_public_key`; `bearer` sets the bearer-token flag.
pub fn make_user(
    account_public_key: &str,
    account_signing_seed: &str,
    name: &str,
    bearer: bool,
) -> Result<UserMaterial> {
    let kp = materialize(KeyPair::new_user())?;

    let claims = claims::UserClaims::new(&kp.public_key, name, account_public_key, bearer);
    let signer = KeyPair::from_seed(account_signing_seed)?;
    let jwt = sign_claims(&claims, &signer)?;
    let creds = creds::format_creds(&jwt, &kp.seed)?;

    Ok(UserMaterial { kp, jwt, creds })
}

/// Re-sign an existing account claim (used by the hook graph when limits or
/// revocations change) without generating new key material.
pub fn resign_account_claims(
    operator_signing_seed: &str,
    claims: &claims::AccountClaims,
) -> Result<String> {
    let signer = KeyPair::from_seed(operator_signing_seed)?;
    sign_claims(claims, &signer)
}

pub fn sign_claims<T: Serialize>(claims: &T, signer: &KeyPair) -> Result<String> {
    let claims_json = serde_json::to_vec(claims)?;
    let claims_b64 = data_encoding::BASE64URL_NOPAD.encode(&claims_json);

    let header_b64 = data_encoding::BASE64URL_NOPAD.encode(br#"{"typ":"JWT","alg":"ed25519-nkey"}"#);

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = signer
        .sign(signing_input.as_bytes())
        .map_err(|e| Error::Crypto(e.to_string()))?;
    let signature_b64 = data_encoding::BASE64URL_NOPAD.encode(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}
