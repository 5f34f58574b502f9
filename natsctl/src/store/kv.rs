//! JetStream KV-backed `Store`.
//!
//! Rows are JSON-encoded under `<collection>.<id>` keys in a single bucket.
//! There's no secondary-index support in a KV bucket, so the by-name/by-key
//! lookups, and the unique-index checks every `save_*` does before writing,
//! list the collection's keys and filter client-side, the same way
//! `reconcile_leaves` walks the `avena_links` bucket.

use async_nats::jetstream::kv::Store as KvHandle;
use async_trait::async_trait;
use futures::StreamExt;

use super::entities::{Account, Limit, Operator, User};
use super::Store;
use crate::error::{Error, Result};

pub struct KvStore {
    kv: KvHandle,
}

impl KvStore {
    pub fn new(kv: KvHandle) -> Self {
        Self { kv }
    }

    async fn get_row<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv.get(key).await.map_err(|e| Error::Store(e.to_string()))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_row<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.kv
            .put(key, bytes.into())
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn delete_row(&self, key: &str) -> Result<()> {
        self.kv.delete(key).await.map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn scan<T: serde::de::DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let mut keys = self.kv.keys().await.map_err(|e| Error::Store(e.to_string()))?;
        let mut matched = Vec::new();
        while let Some(key) = keys.next().await {
            let key = key.map_err(|e| Error::Store(e.to_string()))?;
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(row) = self.get_row::<T>(&key).await? {
                matched.push(row);
            }
        }
        Ok(matched)
    }
}

fn operator_key(id: &str) -> String {
    format!("operators.{id}")
}
fn account_key(id: &str) -> String {
    format!("accounts.{id}")
}
fn user_key(id: &str) -> String {
    format!("users.{id}")
}
fn limit_key(id: &str) -> String {
    format!("limits.{id}")
}

#[async_trait]
impl Store for KvStore {
    async fn get_operator(&self, id: &str) -> Result<Operator> {
        self.get_row(&operator_key(id)).await?.ok_or(Error::NotFound)
    }

    async fn find_operator_by_url(&self, url: &str) -> Result<Option<Operator>> {
        let rows: Vec<Operator> = self.scan("operators.").await?;
        Ok(rows.into_iter().find(|o| o.url == url))
    }

    async fn list_operators(&self) -> Result<Vec<Operator>> {
        self.scan("operators.").await
    }

    async fn save_operator(&self, operator: &Operator) -> Result<()> {
        let existing: Vec<Operator> = self.scan("operators.").await?;
        if existing
            .iter()
            .any(|o| o.id != operator.id && (o.url == operator.url || o.public_key == operator.public_key))
        {
            return Err(Error::Validation(format!(
                "operator url {} or public key already in use",
                operator.url
            )));
        }
        self.put_row(&operator_key(&operator.id), operator).await
    }

    async fn delete_operator(&self, id: &str) -> Result<()> {
        self.delete_row(&operator_key(id)).await
    }

    async fn get_account(&self, id: &str) -> Result<Account> {
        self.get_row(&account_key(id)).await?.ok_or(Error::NotFound)
    }

    async fn find_account_by_public_key(&self, public_key: &str) -> Result<Option<Account>> {
        let rows: Vec<Account> = self.scan("accounts.").await?;
        Ok(rows.into_iter().find(|a| a.public_key == public_key))
    }

    async fn find_account_by_name(&self, operator_id: &str, name: &str) -> Result<Option<Account>> {
        let rows: Vec<Account> = self.scan("accounts.").await?;
        Ok(rows.into_iter().find(|a| a.operator == operator_id && a.name == name))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        self.scan("accounts.").await
    }

    async fn list_accounts_for_operator(&self, operator_id: &str) -> Result<Vec<Account>> {
        let rows: Vec<Account> = self.scan("accounts.").await?;
        Ok(rows.into_iter().filter(|a| a.operator == operator_id).collect())
    }

    async fn save_account(&self, account: &Account) -> Result<()> {
        let existing: Vec<Account> = self.scan("accounts.").await?;
        if existing.iter().any(|a| {
            a.id != account.id
                && (a.public_key == account.public_key
                    || (a.operator == account.operator && a.name == account.name))
        }) {
            return Err(Error::Validation(format!(
                "account name {} or public key already in use under this operator",
                account.name
            )));
        }
        self.put_row(&account_key(&account.id), account).await
    }

    async fn delete_account(&self, id: &str) -> Result<()> {
        self.delete_row(&account_key(id)).await
    }

    async fn get_user(&self, id: &str) -> Result<User> {
        self.get_row(&user_key(id)).await?.ok_or(Error::NotFound)
    }

    async fn find_user_by_public_key(&self, public_key: &str) -> Result<Option<User>> {
        let rows: Vec<User> = self.scan("users.").await?;
        Ok(rows.into_iter().find(|u| u.public_key == public_key))
    }

    async fn list_users_for_account(&self, account_id: &str) -> Result<Vec<User>> {
        let rows: Vec<User> = self.scan("users.").await?;
        Ok(rows.into_iter().filter(|u| u.account == account_id).collect())
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        let existing: Vec<User> = self.scan("users.").await?;
        if existing.iter().any(|u| {
            u.id != user.id && (u.public_key == user.public_key || (u.account == user.account && u.name == user.name))
        }) {
            return Err(Error::Validation(format!(
                "user name {} or public key already in use under this account",
                user.name
            )));
        }
        self.put_row(&user_key(&user.id), user).await
    }

    async fn delete_user(&self, id: &str) -> Result<()> {
        self.delete_row(&user_key(id)).await
    }

    async fn get_limit(&self, id: &str) -> Result<Limit> {
        self.get_row(&limit_key(id)).await?.ok_or(Error::NotFound)
    }

    async fn find_default_account_limit(&self) -> Result<Option<Limit>> {
        let rows: Vec<Limit> = self.scan("limits.").await?;
        Ok(rows.into_iter().find(|l| l.default && l.limit_type == "account"))
    }

    async fn list_limits(&self) -> Result<Vec<Limit>> {
        self.scan("limits.").await
    }

    async fn save_limit(&self, limit: &Limit) -> Result<()> {
        let existing: Vec<Limit> = self.scan("limits.").await?;
        if existing.iter().any(|l| l.id != limit.id && l.name == limit.name) {
            return Err(Error::Validation(format!("limit name {} already in use", limit.name)));
        }
        self.put_row(&limit_key(&limit.id), limit).await
    }

    async fn delete_limit(&self, id: &str) -> Result<()> {
        self.delete_row(&limit_key(id)).await
    }
}
