//! In-memory `Store`, used by the hook-graph tests so reactive behavior can
//! be exercised without a running NATS cluster.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::entities::{Account, Limit, Operator, User};
use super::Store;
use crate::error::{Error, Result};

#[derive(Default)]
pub struct MemoryStore {
    operators: RwLock<HashMap<String, Operator>>,
    accounts: RwLock<HashMap<String, Account>>,
    users: RwLock<HashMap<String, User>>,
    limits: RwLock<HashMap<String, Limit>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_operator(&self, id: &str) -> Result<Operator> {
        self.operators.read().unwrap().get(id).cloned().ok_or(Error::NotFound)
    }

    async fn find_operator_by_url(&self, url: &str) -> Result<Option<Operator>> {
        Ok(self.operators.read().unwrap().values().find(|o| o.url == url).cloned())
    }

    async fn list_operators(&self) -> Result<Vec<Operator>> {
        Ok(self.operators.read().unwrap().values().cloned().collect())
    }

    async fn save_operator(&self, operator: &Operator) -> Result<()> {
        let mut operators = self.operators.write().unwrap();
        if operators
            .values()
            .any(|o| o.id != operator.id && (o.url == operator.url || o.public_key == operator.public_key))
        {
            return Err(Error::Validation(format!(
                "operator url {} or public key already in use",
                operator.url
            )));
        }
        operators.insert(operator.id.clone(), operator.clone());
        Ok(())
    }

    async fn delete_operator(&self, id: &str) -> Result<()> {
        self.operators.write().unwrap().remove(id);
        Ok(())
    }

    async fn get_account(&self, id: &str) -> Result<Account> {
        self.accounts.read().unwrap().get(id).cloned().ok_or(Error::NotFound)
    }

    async fn find_account_by_public_key(&self, public_key: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .values()
            .find(|a| a.public_key == public_key)
            .cloned())
    }

    async fn find_account_by_name(&self, operator_id: &str, name: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .values()
            .find(|a| a.operator == operator_id && a.name == name)
            .cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.read().unwrap().values().cloned().collect())
    }

    async fn list_accounts_for_operator(&self, operator_id: &str) -> Result<Vec<Account>> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .values()
            .filter(|a| a.operator == operator_id)
            .cloned()
            .collect())
    }

    async fn save_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.accounts.write().unwrap();
        let clashes = accounts.values().any(|a| {
            a.id != account.id
                && (a.public_key == account.public_key
                    || (a.operator == account.operator && a.name == account.name))
        });
        if clashes {
            return Err(Error::Validation(format!(
                "account name {} or public key already in use under this operator",
                account.name
            )));
        }
        accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn delete_account(&self, id: &str) -> Result<()> {
        self.accounts.write().unwrap().remove(id);
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<User> {
        self.users.read().unwrap().get(id).cloned().ok_or(Error::NotFound)
    }

    async fn find_user_by_public_key(&self, public_key: &str) -> Result<Option<User>> {
        Ok(self.users.read().unwrap().values().find(|u| u.public_key == public_key).cloned())
    }

    async fn list_users_for_account(&self, account_id: &str) -> Result<Vec<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .filter(|u| u.account == account_id)
            .cloned()
            .collect())
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().unwrap();
        let clashes = users.values().any(|u| {
            u.id != user.id
                && (u.public_key == user.public_key || (u.account == user.account && u.name == user.name))
        });
        if clashes {
            return Err(Error::Validation(format!(
                "user name {} or public key already in use under this account",
                user.name
            )));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> Result<()> {
        self.users.write().unwrap().remove(id);
        Ok(())
    }

    async fn get_limit(&self, id: &str) -> Result<Limit> {
        self.limits.read().unwrap().get(id).cloned().ok_or(Error::NotFound)
    }

    async fn find_default_account_limit(&self) -> Result<Option<Limit>> {
        Ok(self
            .limits
            .read()
            .unwrap()
            .values()
            .find(|l| l.default && l.limit_type == "account")
            .cloned())
    }

    async fn list_limits(&self) -> Result<Vec<Limit>> {
        Ok(self.limits.read().unwrap().values().cloned().collect())
    }

    async fn save_limit(&self, limit: &Limit) -> Result<()> {
        let mut limits = self.limits.write().unwrap();
        if limits.values().any(|l| l.id != limit.id && l.name == limit.name) {
            return Err(Error::Validation(format!("limit name {} already in use", limit.name)));
        }
        limits.insert(limit.id.clone(), limit.clone());
        Ok(())
    }

    async fn delete_limit(&self, id: &str) -> Result<()> {
        self.limits.write().unwrap().remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_an_account() {
        let store = MemoryStore::new();
        let account = Account {
            id: "acc1".into(),
            name: "demo".into(),
            description: String::new(),
            operator: "op1".into(),
            public_key: "ACCPUB".into(),
            private_key: "priv".into(),
            seed: "seed".into(),
            jwt: "jwt".into(),
            sign_public_key: "SIGNPUB".into(),
            sign_private_key: "signpriv".into(),
            sign_seed: "signseed".into(),
            limits: String::new(),
            revocations: Vec::new(),
        };
        store.save_account(&account).await.unwrap();
        let fetched = store.get_account("acc1").await.unwrap();
        assert_eq!(fetched.public_key, "ACCPUB");
        assert_eq!(
            store.find_account_by_public_key("ACCPUB").await.unwrap().unwrap().id,
            "acc1"
        );
    }

    #[tokio::test]
    async fn missing_entity_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.get_user("missing").await, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn duplicate_account_name_under_same_operator_is_rejected() {
        let store = MemoryStore::new();
        let mut a = Account {
            id: "acc1".into(),
            name: "tenant-a".into(),
            description: String::new(),
            operator: "op1".into(),
            public_key: "ACCPUB1".into(),
            private_key: "priv".into(),
            seed: "seed".into(),
            jwt: "jwt".into(),
            sign_public_key: "SIGNPUB1".into(),
            sign_private_key: "signpriv".into(),
            sign_seed: "signseed".into(),
            limits: String::new(),
            revocations: Vec::new(),
        };
        store.save_account(&a).await.unwrap();

        a.id = "acc2".into();
        a.public_key = "ACCPUB2".into();
        assert!(matches!(store.save_account(&a).await, Err(Error::Validation(_))));
    }
}
