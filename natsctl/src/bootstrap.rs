//! Bootstrap.
//!
//! For every configured URL, idempotently ensures operator + SYS account +
//! `sys` user exist, using the store directly so nothing gets republished
//! on every restart. Grounded on the tail of `CreateNATSAuthModule` in
//! `natsauth/nats.go`.

use std::sync::Arc;

use tracing::info;

use crate::cli_context::ContextStore;
use crate::config::Settings;
use crate::error::Result;
use crate::keys::{self, claims};
use crate::store::entities::{Account, Operator, User};
use crate::store::Store;

pub async fn run(store: &dyn Store, cli_context: Option<&Arc<dyn ContextStore>>, settings: &Settings) -> Result<()> {
    for url in &settings.bootstrap_urls {
        ensure_operator_chain(store, url).await?;
    }

    if let Some(op_url) = &settings.initial_operator_url {
        ensure_initial_account(
            store,
            op_url,
            settings.initial_account_name.as_deref().unwrap_or_default(),
            settings.initial_account_public_key.as_deref().unwrap_or_default(),
            settings.initial_account_signing_seed.as_deref().unwrap_or_default(),
        )
        .await?;
    }

    if !settings.disable_cli_contexts {
        if let Some(cli) = cli_context {
            if cli.known().await?.is_empty() {
                seed_cli_contexts(store, cli).await?;
            } else {
                info!("CLI contexts already exist, skipping seed");
            }
        }
    }

    Ok(())
}

async fn ensure_operator_chain(store: &dyn Store, url: &str) -> Result<()> {
    let operator = match store.find_operator_by_url(url).await? {
        Some(operator) => operator,
        None => {
            info!(url, "bootstrap: creating operator");
            let material = keys::make_operator(url)?;
            let operator = Operator::new(url, material.primary, material.signing, material.jwt);
            store.save_operator(&operator).await?;
            operator
        }
    };

    let sys_account = match store.find_account_by_name(&operator.id, "SYS").await? {
        Some(account) => account,
        None => {
            info!(operator_id = %operator.id, "bootstrap: creating SYS account");
            let material = keys::make_account(&operator.sign_seed, "SYS", &claims::OperatorLimits::unconstrained())?;
            let account = Account::new(&operator.id, "SYS", material.primary, material.signing, material.jwt);
            store.save_account(&account).await?;
            account
        }
    };

    let has_sys_user = store
        .list_users_for_account(&sys_account.id)
        .await?
        .iter()
        .any(|u| u.name == "sys");
    if !has_sys_user {
        info!(account_id = %sys_account.id, "bootstrap: creating sys user");
        let material = keys::make_user(&sys_account.public_key, &sys_account.sign_seed, "sys", false)?;
        let user = User::new(&sys_account.id, "sys", false, material.kp, material.jwt, material.creds);
        store.save_user(&user).await?;
    }

    Ok(())
}

/// Seeds an externally controlled operator: the operator itself is not
/// created (there is no signing seed for it locally), only the account
/// that this core is authorized to sign users under.
async fn ensure_initial_account(
    store: &dyn Store,
    operator_url: &str,
    name: &str,
    public_key: &str,
    signing_seed: &str,
) -> Result<()> {
    let operator = match store.find_operator_by_url(operator_url).await? {
        Some(operator) => operator,
        None => {
            let operator = Operator {
                id: uuid::Uuid::new_v4().to_string(),
                url: operator_url.to_string(),
                description: String::new(),
                public_key: String::new(),
                private_key: String::new(),
                seed: String::new(),
                jwt: String::new(),
                sign_public_key: String::new(),
                sign_private_key: String::new(),
                sign_seed: String::new(),
            };
            store.save_operator(&operator).await?;
            operator
        }
    };

    if store.find_account_by_name(&operator.id, name).await?.is_some() {
        info!(name, "bootstrap: initial account already exists");
        return Ok(());
    }

    info!(name, "bootstrap: creating initial account");
    let account = Account {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: String::new(),
        operator: operator.id,
        public_key: public_key.to_string(),
        private_key: String::new(),
        seed: String::new(),
        jwt: String::new(),
        sign_public_key: String::new(),
        sign_private_key: String::new(),
        sign_seed: signing_seed.to_string(),
        limits: String::new(),
        revocations: Vec::new(),
    };
    store.save_account(&account).await?;
    Ok(())
}

async fn seed_cli_contexts(store: &dyn Store, cli: &Arc<dyn ContextStore>) -> Result<()> {
    let accounts = store.list_accounts().await?;
    let mut count = 0;
    for account in &accounts {
        let operator = store.get_operator(&account.operator).await?;
        for user in store.list_users_for_account(&account.id).await? {
            cli.upsert(&operator, account, &user).await?;
            count += 1;
        }
    }
    info!(user_count = count, "bootstrap: seeded initial CLI contexts");
    Ok(())
}
