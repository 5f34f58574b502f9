//! Entity row shapes, mirroring the four collections of the original schema
//! (`nats_auth_operators`, `nats_auth_accounts`, `nats_auth_users`,
//! `nats_auth_limits`).

use serde::{Deserialize, Serialize};

use crate::keys::GeneratedKeyPair;

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub url: String,
    pub description: String,
    pub public_key: String,
    pub private_key: String,
    pub seed: String,
    pub jwt: String,
    pub sign_public_key: String,
    pub sign_private_key: String,
    pub sign_seed: String,
}

impl Operator {
    pub fn new(url: &str, primary: GeneratedKeyPair, signing: GeneratedKeyPair, jwt: String) -> Self {
        Self {
            id: new_id(),
            url: url.to_string(),
            description: String::new(),
            public_key: primary.public_key,
            private_key: primary.private_key,
            seed: primary.seed,
            jwt,
            sign_public_key: signing.public_key,
            sign_private_key: signing.private_key,
            sign_seed: signing.seed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub description: String,
    pub operator: String,
    pub public_key: String,
    pub private_key: String,
    pub seed: String,
    pub jwt: String,
    pub sign_public_key: String,
    pub sign_private_key: String,
    pub sign_seed: String,
    /// References a `Limit` row id; empty means "use the default".
    pub limits: String,
    /// User public keys revoked from this account, accumulated across every
    /// user deletion so a re-sign never drops an earlier revocation.
    #[serde(default)]
    pub revocations: Vec<String>,
}

impl Account {
    pub fn new(
        operator_id: &str,
        name: &str,
        primary: GeneratedKeyPair,
        signing: GeneratedKeyPair,
        jwt: String,
    ) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            description: String::new(),
            operator: operator_id.to_string(),
            public_key: primary.public_key,
            private_key: primary.private_key,
            seed: primary.seed,
            jwt,
            sign_public_key: signing.public_key,
            sign_private_key: signing.private_key,
            sign_seed: signing.seed,
            limits: String::new(),
            revocations: Vec::new(),
        }
    }

    pub fn is_sys(&self) -> bool {
        self.name == "SYS"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub description: String,
    pub account: String,
    pub bearer: bool,
    pub public_key: String,
    pub private_key: String,
    pub seed: String,
    pub jwt: String,
    pub creds: String,
}

impl User {
    pub fn new(
        account_id: &str,
        name: &str,
        bearer: bool,
        kp: GeneratedKeyPair,
        jwt: String,
        creds: String,
    ) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            description: String::new(),
            account: account_id.to_string(),
            bearer,
            public_key: kp.public_key,
            private_key: kp.private_key,
            seed: kp.seed,
            jwt,
            creds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limit {
    pub id: String,
    pub name: String,
    /// Only `"account"` exists today but is modeled as a string the way the
    /// original's single-value select field was, rather than hard-coding a
    /// unit enum around one variant.
    #[serde(rename = "type")]
    pub limit_type: String,
    pub max_connections: i64,
    pub jetstream_max_memory: i64,
    pub jetstream_max_disk: i64,
    pub default: bool,
}

impl Limit {
    pub fn new(name: &str, max_connections: i64, jetstream_max_memory: i64, jetstream_max_disk: i64) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            limit_type: "account".to_string(),
            max_connections,
            jetstream_max_memory,
            jetstream_max_disk,
            default: false,
        }
    }
}
