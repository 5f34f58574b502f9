//! NATS claim shapes, following the `jwt.v2` wire format used by the
//! original nats-tower source (`natsauth/generators.go`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OperatorClaims {
    pub jti: String,
    pub iat: i64,
    pub iss: String,
    pub name: String,
    pub sub: String,
    pub nats: OperatorNats,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OperatorNats {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub version: u8,
    pub signing_keys: Vec<String>,
}

impl OperatorClaims {
    pub fn new(public_key: &str, _url: &str, signing_public_key: &str) -> Self {
        Self {
            jti: Uuid::new_v4().to_string(),
            iat: now_secs(),
            iss: public_key.to_string(),
            name: public_key.to_string(),
            sub: public_key.to_string(),
            nats: OperatorNats {
                claim_type: "operator".to_string(),
                version: 2,
                signing_keys: vec![signing_public_key.to_string()],
            },
        }
    }
}

/// The computed `OperatorLimits` embedded into non-SYS account claims.
/// Resolved by the limit resolver (§4.C); `-1` throughout means unlimited.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OperatorLimits {
    pub subs: i64,
    pub conn: i64,
    #[serde(rename = "leaf")]
    pub leaf_node_conn: i64,
    pub imports: i64,
    pub exports: i64,
    pub data: i64,
    pub payload: i64,
    pub wildcards: bool,
    pub disk_storage: i64,
    pub mem_storage: i64,
    pub streams: i64,
    pub consumer: i64,
}

impl OperatorLimits {
    pub const NO_LIMIT: i64 = -1;

    /// The unconstrained fallback: every field set to `NoLimit`, wildcard
    /// exports enabled.
    pub fn unconstrained() -> Self {
        Self {
            subs: Self::NO_LIMIT,
            conn: Self::NO_LIMIT,
            leaf_node_conn: Self::NO_LIMIT,
            imports: Self::NO_LIMIT,
            exports: Self::NO_LIMIT,
            data: Self::NO_LIMIT,
            payload: Self::NO_LIMIT,
            wildcards: true,
            disk_storage: Self::NO_LIMIT,
            mem_storage: Self::NO_LIMIT,
            streams: Self::NO_LIMIT,
            consumer: Self::NO_LIMIT,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccountClaims {
    pub jti: String,
    pub iat: i64,
    pub iss: String,
    pub name: String,
    pub sub: String,
    pub nats: AccountNats,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccountNats {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub version: u8,
    pub signing_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<OperatorLimits>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub exports: Vec<Export>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub revocations: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Export {
    pub name: String,
    pub subject: String,
    #[serde(rename = "type")]
    pub export_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    pub account_token_position: u8,
}

impl AccountClaims {
    pub fn new(
        public_key: &str,
        name: &str,
        signing_public_key: &str,
        limits: OperatorLimits,
    ) -> Self {
        Self {
            jti: Uuid::new_v4().to_string(),
            iat: now_secs(),
            iss: String::new(), // filled by caller (operator/account signing key) at sign time
            name: name.to_string(),
            sub: public_key.to_string(),
            nats: AccountNats {
                claim_type: "account".to_string(),
                version: 2,
                signing_keys: vec![signing_public_key.to_string()],
                limits: Some(limits),
                exports: vec![],
                revocations: vec![],
            },
        }
    }

    /// The `SYS` account carries the two fixed monitoring exports instead of
    /// `OperatorLimits`. `AccountTokenPosition` values (3 for the stream
    /// export, 4 for the service export) are tied to the subject shape of
    /// `$SYS.ACCOUNT.*.>` / `$SYS.REQ.ACCOUNT.*.*`.
    pub fn new_sys(public_key: &str, name: &str, signing_public_key: &str) -> Self {
        Self {
            jti: Uuid::new_v4().to_string(),
            iat: now_secs(),
            iss: String::new(),
            name: name.to_string(),
            sub: public_key.to_string(),
            nats: AccountNats {
                claim_type: "account".to_string(),
                version: 2,
                signing_keys: vec![signing_public_key.to_string()],
                limits: None,
                exports: vec![
                    Export {
                        name: "account-monitoring-streams".to_string(),
                        subject: "$SYS.ACCOUNT.*.>".to_string(),
                        export_type: "stream".to_string(),
                        response_type: None,
                        account_token_position: 3,
                    },
                    Export {
                        name: "account-monitoring-services".to_string(),
                        subject: "$SYS.REQ.ACCOUNT.*.*".to_string(),
                        export_type: "service".to_string(),
                        response_type: Some("stream".to_string()),
                        account_token_position: 4,
                    },
                ],
                revocations: vec![],
            },
        }
    }

    /// Add a public key to the revocation set (used when deleting a user).
    pub fn revoke(&mut self, public_key: &str) {
        if !self.nats.revocations.contains(&public_key.to_string()) {
            self.nats.revocations.push(public_key.to_string());
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserClaims {
    pub jti: String,
    pub iat: i64,
    pub iss: String,
    pub name: String,
    pub sub: String,
    pub nats: UserNats,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserNats {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub version: u8,
    pub issuer_account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<bool>,
}

impl UserClaims {
    pub fn new(public_key: &str, name: &str, issuer_account: &str, bearer: bool) -> Self {
        Self {
            jti: Uuid::new_v4().to_string(),
            iat: now_secs(),
            iss: issuer_account.to_string(),
            name: name.to_string(),
            sub: public_key.to_string(),
            nats: UserNats {
                claim_type: "user".to_string(),
                version: 2,
                issuer_account: issuer_account.to_string(),
                bearer_token: if bearer { Some(true) } else { None },
            },
        }
    }
}

/// A claim carrying an arbitrary `data` map, used for `CLAIMS.DELETE`
/// requests (`data.accounts` lists the target account's public key).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenericClaims {
    pub jti: String,
    pub iat: i64,
    pub iss: String,
    pub sub: String,
    pub data: serde_json::Value,
}

impl GenericClaims {
    pub fn account_deletion(operator_public_key: &str, account_public_key: &str) -> Self {
        Self {
            jti: Uuid::new_v4().to_string(),
            iat: now_secs(),
            iss: operator_public_key.to_string(),
            sub: operator_public_key.to_string(),
            data: serde_json::json!({ "accounts": [account_public_key] }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconstrained_limits_are_all_no_limit() {
        let limits = OperatorLimits::unconstrained();
        assert_eq!(limits.conn, -1);
        assert!(limits.wildcards);
    }

    #[test]
    fn sys_account_claims_carry_fixed_exports() {
        let claims = AccountClaims::new_sys("ACCPUB", "SYS", "SIGNPUB");
        assert_eq!(claims.nats.exports.len(), 2);
        assert!(claims.nats.limits.is_none());
        assert_eq!(claims.nats.exports[0].account_token_position, 3);
        assert_eq!(claims.nats.exports[1].account_token_position, 4);
    }

    #[test]
    fn revoke_is_idempotent() {
        let mut claims = AccountClaims::new("PUB", "acc", "SIGN", OperatorLimits::unconstrained());
        claims.revoke("USERPUB");
        claims.revoke("USERPUB");
        assert_eq!(claims.nats.revocations, vec!["USERPUB".to_string()]);
    }
}
