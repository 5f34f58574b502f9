//! Entity store abstraction.
//!
//! `Store` is the plain CRUD surface: no hooks, no publication, no
//! reactivity. The hook graph (`crate::hooks`) wraps a `Store` and adds all
//! of that; bootstrap talks to a `Store` directly, which is exactly the
//! "without hooks" write path the original PocketBase module used to avoid
//! recursive republication during startup.

pub mod entities;
pub mod kv;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use entities::{Account, Limit, Operator, User};

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_operator(&self, id: &str) -> Result<Operator>;
    async fn find_operator_by_url(&self, url: &str) -> Result<Option<Operator>>;
    async fn list_operators(&self) -> Result<Vec<Operator>>;
    async fn save_operator(&self, operator: &Operator) -> Result<()>;
    async fn delete_operator(&self, id: &str) -> Result<()>;

    async fn get_account(&self, id: &str) -> Result<Account>;
    async fn find_account_by_public_key(&self, public_key: &str) -> Result<Option<Account>>;
    async fn find_account_by_name(&self, operator_id: &str, name: &str) -> Result<Option<Account>>;
    async fn list_accounts(&self) -> Result<Vec<Account>>;
    async fn list_accounts_for_operator(&self, operator_id: &str) -> Result<Vec<Account>>;
    async fn save_account(&self, account: &Account) -> Result<()>;
    async fn delete_account(&self, id: &str) -> Result<()>;

    async fn get_user(&self, id: &str) -> Result<User>;
    async fn find_user_by_public_key(&self, public_key: &str) -> Result<Option<User>>;
    async fn list_users_for_account(&self, account_id: &str) -> Result<Vec<User>>;
    async fn save_user(&self, user: &User) -> Result<()>;
    async fn delete_user(&self, id: &str) -> Result<()>;

    async fn get_limit(&self, id: &str) -> Result<Limit>;
    async fn find_default_account_limit(&self) -> Result<Option<Limit>>;
    async fn list_limits(&self) -> Result<Vec<Limit>>;
    async fn save_limit(&self, limit: &Limit) -> Result<()>;
    async fn delete_limit(&self, id: &str) -> Result<()>;
}
