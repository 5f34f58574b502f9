//! Reactive Hook Graph — the central state machine.
//!
//! Wires entity-store writes to the cryptographic and publication actions
//! so that persisted JWTs and the live cluster never drift. Grounded on
//! `natsauth/nats.go`'s `CreateNATSAuthModule` hook bindings
//! (`OnRecordCreate`, `OnRecordAfterCreateSuccess`,
//! `OnRecordAfterUpdateSuccess`, `OnRecordAfterDeleteSuccess`) and
//! `handleLimitAndAccountUpdate`/`handleNatsContextUpsert`.
//!
//! Every write that would recurse back into this graph goes through the
//! underlying `Store` directly (the "without hooks" path); `HookGraph`
//! itself never calls its own methods internally for persistence, only
//! `self.store.save_*`.
//!
//! A note on transactionality: the original ran cascading updates inside a
//! single database transaction and published only after commit. The
//! JetStream-KV-backed store here has no cross-key transaction primitive,
//! so the ordering guarantee is reproduced at a coarser grain instead: all
//! local writes for one logical operation complete (and are durable)
//! before any publication is attempted, so a publish failure never leaves
//! a half-written local state, even though a local-write failure partway
//! through a cascade isn't rolled back.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cli_context::ContextStore;
use crate::error::{Error, Result};
use crate::keys::claims::AccountClaims;
use crate::keys::{self, claims};
use crate::limits;
use crate::publish::Publisher;
use crate::store::entities::{Account, Limit, Operator, User};
use crate::store::Store;

pub struct HookGraph {
    store: Arc<dyn Store>,
    publisher: Arc<dyn Publisher>,
    cli_context: Option<Arc<dyn ContextStore>>,
}

impl HookGraph {
    pub fn new(
        store: Arc<dyn Store>,
        publisher: Arc<dyn Publisher>,
        cli_context: Option<Arc<dyn ContextStore>>,
    ) -> Self {
        Self {
            store,
            publisher,
            cli_context,
        }
    }

    /// `onCreate operator`: generates key material and a self-signed JWT.
    pub async fn create_operator(&self, url: &str) -> Result<Operator> {
        let material = keys::make_operator(url)?;
        let operator = Operator::new(url, material.primary, material.signing, material.jwt);
        self.store.save_operator(&operator).await?;
        info!(url, "operator created");
        Ok(operator)
    }

    /// `onCreate account` + `afterCreate account`. Fails with a validation
    /// error if the parent operator has no signing seed (externally
    /// controlled operators are read-only for account creation).
    pub async fn create_account(&self, operator_id: &str, name: &str, description: &str) -> Result<Account> {
        let operator = self.store.get_operator(operator_id).await?;
        if operator.sign_seed.is_empty() {
            return Err(Error::Validation(
                "operator has no signing seed; it is not under our control".into(),
            ));
        }

        let account = if name == "SYS" {
            let material = keys::make_account(&operator.sign_seed, name, &claims::OperatorLimits::unconstrained())?;
            let mut account = Account::new(operator_id, name, material.primary, material.signing, material.jwt);
            account.description = description.to_string();
            account
        } else {
            let limits = limits::resolve_for_new_account(self.store.as_ref()).await?;
            let material = keys::make_account(&operator.sign_seed, name, &limits)?;
            let mut account = Account::new(operator_id, name, material.primary, material.signing, material.jwt);
            account.description = description.to_string();
            account
        };

        self.store.save_account(&account).await?;
        info!(account = %account.name, operator_id, "account created");

        if !account.is_sys() {
            if let Err(e) = self.publisher.publish_account(&operator, &self.sys_user(operator_id).await?, &account).await {
                error!(error = %e, account = %account.name, "could not publish created account");
            }
        }

        Ok(account)
    }

    /// `onCreate user` + `afterCreate user`.
    pub async fn create_user(&self, account_id: &str, name: &str, bearer: bool) -> Result<User> {
        let account = self.store.get_account(account_id).await?;
        let material = keys::make_user(&account.public_key, &account.sign_seed, name, bearer)?;
        let user = User::new(account_id, name, bearer, material.kp, material.jwt, material.creds);
        self.store.save_user(&user).await?;
        info!(user = %user.name, account_id, "user created");

        if let Some(cli) = &self.cli_context {
            let operator = self.store.get_operator(&account.operator).await?;
            if let Err(e) = cli.upsert(&operator, &account, &user).await {
                error!(error = %e, user = %user.name, "could not write CLI context for user");
            }
        }

        Ok(user)
    }

    /// `afterUpdate limits`: re-signs every account referencing this limit.
    pub async fn update_limit(&self, limit: Limit) -> Result<()> {
        self.store.save_limit(&limit).await?;
        info!(limit = %limit.name, "limit updated");

        let accounts = self.store.list_accounts().await?;
        for account in accounts.into_iter().filter(|a| a.limits == limit.id) {
            if let Err(e) = self.resign_and_publish_account(account.id.clone(), None).await {
                error!(error = %e, account_id = %account.id, "could not update account with new limits");
            }
        }
        Ok(())
    }

    /// `afterUpdate account`: reassigns the `limits` relation, then
    /// re-signs and republishes (SYS accounts are exempt).
    pub async fn update_account_limits(&self, account_id: &str, limit_id: &str) -> Result<Account> {
        let mut account = self.store.get_account(account_id).await?;
        account.limits = limit_id.to_string();
        self.store.save_account(&account).await?;

        if !account.is_sys() {
            self.resign_and_publish_account(account_id.to_string(), None).await?;
        }
        self.store.get_account(account_id).await
    }

    /// `afterUpdate user`: re-upserts the CLI context and credentials file
    /// for the user if the feature is enabled. User key material is never
    /// regenerated on update, so nothing needs to be re-signed.
    pub async fn update_user(&self, user_id: &str, description: &str) -> Result<User> {
        let mut user = self.store.get_user(user_id).await?;
        user.description = description.to_string();
        self.store.save_user(&user).await?;
        info!(user = %user.name, "user updated");

        if let Some(cli) = &self.cli_context {
            let account = self.store.get_account(&user.account).await?;
            let operator = self.store.get_operator(&account.operator).await?;
            if let Err(e) = cli.upsert(&operator, &account, &user).await {
                error!(error = %e, user = %user.name, "could not update CLI context for user");
            }
        }

        Ok(user)
    }

    /// Re-signs and republishes an account (no-op for SYS). `new_revocation`,
    /// if given, is folded into the account's revocation set before signing
    /// so the whole update is a single `save_account` call.
    async fn resign_and_publish_account(&self, account_id: String, new_revocation: Option<&str>) -> Result<()> {
        let mut account = self.store.get_account(&account_id).await?;
        if account.is_sys() {
            return Ok(());
        }
        if let Some(revoked) = new_revocation {
            if !account.revocations.iter().any(|r| r == revoked) {
                account.revocations.push(revoked.to_string());
            }
        }

        let operator = self.store.get_operator(&account.operator).await?;
        let effective_limits = limits::resolve(self.store.as_ref(), &account).await?;

        let mut claims = AccountClaims::new(&account.public_key, &account.name, &account.sign_public_key, effective_limits);
        for revoked in &account.revocations {
            claims.revoke(revoked);
        }

        let jwt = keys::resign_account_claims(&operator.sign_seed, &claims)?;
        account.jwt = jwt;
        self.store.save_account(&account).await?;

        info!(account = %account.name, "publishing updated account");
        let sys_user = self.sys_user(&operator.id).await?;
        if let Err(e) = self.publisher.publish_account(&operator, &sys_user, &account).await {
            error!(error = %e, account = %account.name, "could not publish updated account");
        }
        Ok(())
    }

    /// `afterDelete account`: cascades to users (raw, no further
    /// reactivity) and publishes a removal unless this is the SYS account.
    pub async fn delete_account(&self, account_id: &str) -> Result<()> {
        let account = self.store.get_account(account_id).await?;

        for user in self.store.list_users_for_account(account_id).await? {
            self.store.delete_user(&user.id).await?;
            if let Some(cli) = &self.cli_context {
                let _ = cli.remove(&user.id).await;
            }
        }

        self.store.delete_account(account_id).await?;
        info!(account = %account.name, "account deleted");

        if !account.is_sys() {
            let operator = self.store.get_operator(&account.operator).await?;
            let sys_user = self.sys_user(&operator.id).await?;
            if let Err(e) = self.publisher.publish_account_removal(&operator, &sys_user, &account).await {
                error!(error = %e, account = %account.name, "could not publish removed account");
            }
        }
        Ok(())
    }

    /// `afterDelete user`: revokes the user from the owning account's
    /// claim, re-signs, republishes (unless owning account is SYS or
    /// already gone), and cleans up the CLI context.
    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        let user = self.store.get_user(user_id).await?;
        self.store.delete_user(user_id).await?;
        info!(user = %user.name, "user deleted");

        match self.store.get_account(&user.account).await {
            Ok(account) => {
                if let Err(e) = self.resign_and_publish_account(account.id, Some(&user.public_key)).await {
                    error!(error = %e, user = %user.name, "could not update account after user was removed");
                }
            }
            Err(Error::NotFound) => {
                warn!(user = %user.name, "account for user not found, skipping account update");
            }
            Err(e) => return Err(e),
        }

        if let Some(cli) = &self.cli_context {
            cli.remove(user_id).await?;
        }
        Ok(())
    }

    /// Cascades to every account under the operator, then removes it.
    pub async fn delete_operator(&self, operator_id: &str) -> Result<()> {
        for account in self.store.list_accounts_for_operator(operator_id).await? {
            self.delete_account(&account.id).await?;
        }
        self.store.delete_operator(operator_id).await?;
        Ok(())
    }

    async fn sys_user(&self, operator_id: &str) -> Result<User> {
        let sys_account = self
            .store
            .find_account_by_name(operator_id, "SYS")
            .await?
            .ok_or(Error::NotFound)?;
        self.store
            .list_users_for_account(&sys_account.id)
            .await?
            .into_iter()
            .find(|u| u.name == "sys")
            .ok_or(Error::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::fake::FakePublisher;
    use crate::store::memory::MemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeContextStore {
        upserted: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ContextStore for FakeContextStore {
        async fn upsert(&self, _operator: &Operator, _account: &Account, user: &User) -> Result<()> {
            self.upserted.lock().unwrap().push(user.id.clone());
            Ok(())
        }
        async fn remove(&self, _user_id: &str) -> Result<()> {
            Ok(())
        }
        async fn selected(&self) -> Result<Option<String>> {
            Ok(None)
        }
        async fn known(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn select(&self, _user_id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn graph() -> (HookGraph, Arc<MemoryStore>, Arc<FakePublisher>) {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(FakePublisher::default());
        let graph = HookGraph::new(store.clone(), publisher.clone(), None);
        (graph, store, publisher)
    }

    fn graph_with_cli() -> (HookGraph, Arc<MemoryStore>, Arc<FakePublisher>, Arc<FakeContextStore>) {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(FakePublisher::default());
        let cli = Arc::new(FakeContextStore::default());
        let graph = HookGraph::new(store.clone(), publisher.clone(), Some(cli.clone()));
        (graph, store, publisher, cli)
    }

    async fn bootstrap_operator_and_sys(store: &Arc<MemoryStore>) -> (Operator, Account, User) {
        let material = keys::make_operator("nats://localhost:4222").unwrap();
        let operator = Operator::new("nats://localhost:4222", material.primary, material.signing, material.jwt);
        store.save_operator(&operator).await.unwrap();

        let sys_material = keys::make_account(&operator.sign_seed, "SYS", &claims::OperatorLimits::unconstrained()).unwrap();
        let sys_account = Account::new(&operator.id, "SYS", sys_material.primary, sys_material.signing, sys_material.jwt);
        store.save_account(&sys_account).await.unwrap();

        let sys_user_material = keys::make_user(&sys_account.public_key, &sys_account.sign_seed, "sys", false).unwrap();
        let sys_user = User::new(
            &sys_account.id,
            "sys",
            false,
            sys_user_material.kp,
            sys_user_material.jwt,
            sys_user_material.creds,
        );
        store.save_user(&sys_user).await.unwrap();

        (operator, sys_account, sys_user)
    }

    #[tokio::test]
    async fn create_account_publishes_unless_sys() {
        let (graph, store, publisher) = graph();
        let (operator, _sys_account, _sys_user) = bootstrap_operator_and_sys(&store).await;

        let account = graph.create_account(&operator.id, "tenant-a", "").await.unwrap();
        assert!(!account.public_key.is_empty());
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_account_rejects_uncontrolled_operator() {
        let (graph, store, _publisher) = graph();
        let mut operator_material = keys::make_operator("nats://externally-controlled:4222").unwrap();
        operator_material.signing.seed.clear();
        let mut operator = Operator::new(
            "nats://externally-controlled:4222",
            operator_material.primary,
            operator_material.signing,
            operator_material.jwt,
        );
        operator.sign_seed.clear();
        store.save_operator(&operator).await.unwrap();

        let result = graph.create_account(&operator.id, "tenant-a", "").await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn deleting_a_user_revokes_and_republishes() {
        let (graph, store, publisher) = graph();
        let (operator, _sys_account, _sys_user) = bootstrap_operator_and_sys(&store).await;
        let account = graph.create_account(&operator.id, "tenant-a", "").await.unwrap();
        let user = graph.create_user(&account.id, "alice", false).await.unwrap();

        publisher.published.lock().unwrap().clear();
        graph.delete_user(&user.id).await.unwrap();

        let updated = store.get_account(&account.id).await.unwrap();
        assert!(updated.revocations.contains(&user.public_key));
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn updating_a_user_upserts_cli_context() {
        let (graph, store, _publisher, cli) = graph_with_cli();
        let (operator, _sys_account, _sys_user) = bootstrap_operator_and_sys(&store).await;
        let account = graph.create_account(&operator.id, "tenant-a", "").await.unwrap();
        let user = graph.create_user(&account.id, "alice", false).await.unwrap();

        cli.upserted.lock().unwrap().clear();
        let updated = graph.update_user(&user.id, "alice's laptop").await.unwrap();

        assert_eq!(updated.description, "alice's laptop");
        assert_eq!(cli.upserted.lock().unwrap().as_slice(), &[user.id.clone()]);
    }

    #[tokio::test]
    async fn deleting_sys_account_never_publishes_removal() {
        let (graph, store, publisher) = graph();
        let (operator, sys_account, _sys_user) = bootstrap_operator_and_sys(&store).await;
        let _ = operator;
        graph.delete_account(&sys_account.id).await.unwrap();
        assert_eq!(publisher.removed.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn deleting_account_publishes_removal_and_cascades_users() {
        let (graph, store, publisher) = graph();
        let (operator, _sys_account, _sys_user) = bootstrap_operator_and_sys(&store).await;
        let account = graph.create_account(&operator.id, "tenant-a", "").await.unwrap();
        let user = graph.create_user(&account.id, "alice", false).await.unwrap();

        graph.delete_account(&account.id).await.unwrap();

        assert!(matches!(store.get_user(&user.id).await, Err(Error::NotFound)));
        assert_eq!(publisher.removed.lock().unwrap().len(), 1);
    }
}
