//! Limit Resolver.
//!
//! Three-step resolution, mirroring `getAccountLimits` in the original:
//! 1. the account's own `limits` relation, if set
//! 2. the single limit row with `type=account, default=true`, if any
//! 3. an unconstrained fallback

use crate::error::Result;
use crate::keys::claims::OperatorLimits;
use crate::store::entities::{Account, Limit};
use crate::store::Store;

fn limits_from_row(row: &Limit) -> OperatorLimits {
    OperatorLimits {
        subs: OperatorLimits::NO_LIMIT,
        conn: row.max_connections,
        leaf_node_conn: OperatorLimits::NO_LIMIT,
        imports: OperatorLimits::NO_LIMIT,
        exports: OperatorLimits::NO_LIMIT,
        data: OperatorLimits::NO_LIMIT,
        payload: OperatorLimits::NO_LIMIT,
        wildcards: true,
        disk_storage: row.jetstream_max_disk,
        mem_storage: row.jetstream_max_memory,
        streams: OperatorLimits::NO_LIMIT,
        consumer: OperatorLimits::NO_LIMIT,
    }
}

/// Steps 2 and 3 of resolution, for an account that doesn't exist yet (so
/// there's no `account.limits` to check first).
pub async fn resolve_for_new_account(store: &dyn Store) -> Result<OperatorLimits> {
    if let Some(row) = store.find_default_account_limit().await? {
        return Ok(limits_from_row(&row));
    }
    Ok(OperatorLimits::unconstrained())
}

pub async fn resolve(store: &dyn Store, account: &Account) -> Result<OperatorLimits> {
    if !account.limits.is_empty() {
        if let Ok(row) = store.get_limit(&account.limits).await {
            return Ok(limits_from_row(&row));
        }
    }

    if let Some(row) = store.find_default_account_limit().await? {
        return Ok(limits_from_row(&row));
    }

    Ok(OperatorLimits::unconstrained())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::entities::Limit;
    use crate::store::memory::MemoryStore;

    fn account_with_limit(limit_id: &str) -> Account {
        Account {
            id: "acc1".into(),
            name: "demo".into(),
            description: String::new(),
            operator: "op1".into(),
            public_key: "PUB".into(),
            private_key: "priv".into(),
            seed: "seed".into(),
            jwt: "jwt".into(),
            sign_public_key: "SIGNPUB".into(),
            sign_private_key: "signpriv".into(),
            sign_seed: "signseed".into(),
            limits: limit_id.to_string(),
            revocations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn explicit_limit_wins_over_default() {
        let store = MemoryStore::new();
        let explicit = Limit::new("explicit", 10, 1024, 2048);
        let mut default = Limit::new("default", 99, 9999, 9999);
        default.default = true;
        store.save_limit(&explicit).await.unwrap();
        store.save_limit(&default).await.unwrap();

        let account = account_with_limit(&explicit.id);
        let resolved = resolve(&store, &account).await.unwrap();
        assert_eq!(resolved.conn, 10);
        assert_eq!(resolved.disk_storage, 2048);
    }

    #[tokio::test]
    async fn falls_back_to_default_when_unset() {
        let store = MemoryStore::new();
        let mut default = Limit::new("default", 42, 111, 222);
        default.default = true;
        store.save_limit(&default).await.unwrap();

        let account = account_with_limit("");
        let resolved = resolve(&store, &account).await.unwrap();
        assert_eq!(resolved.conn, 42);
    }

    #[tokio::test]
    async fn falls_back_to_unconstrained_when_nothing_matches() {
        let store = MemoryStore::new();
        let account = account_with_limit("");
        let resolved = resolve(&store, &account).await.unwrap();
        assert_eq!(resolved.conn, OperatorLimits::NO_LIMIT);
        assert!(resolved.wildcards);
    }
}
