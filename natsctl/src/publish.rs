//! Publication Protocol.
//!
//! Pushes an account claim (or its removal) onto the live cluster over the
//! `$SYS.REQ.CLAIMS.UPDATE` / `$SYS.REQ.CLAIMS.DELETE` subjects, connecting
//! as the operator's own `sys` user. Mirrors `publishAccountRecord` /
//! `publishAccountRecordRemoval`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::keys::claims::GenericClaims;
use crate::keys::creds::format_creds;
use crate::store::entities::{Account, Operator, User};

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_account(&self, operator: &Operator, sys_user: &User, account: &Account) -> Result<()>;

    async fn publish_account_removal(
        &self,
        operator: &Operator,
        sys_user: &User,
        account: &Account,
    ) -> Result<()>;
}

pub struct NatsPublisher;

impl NatsPublisher {
    pub fn new() -> Self {
        Self
    }

    async fn connect(&self, operator: &Operator, sys_user: &User) -> Result<async_nats::Client> {
        let creds = format_creds(&sys_user.jwt, &sys_user.seed)?;
        async_nats::ConnectOptions::with_credentials(&creds)?
            .connect(&operator.url)
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

impl Default for NatsPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn publish_account(&self, operator: &Operator, sys_user: &User, account: &Account) -> Result<()> {
        let client = self.connect(operator, sys_user).await?;
        info!(account = %account.name, operator = %operator.url, "publishing account");

        let response = tokio::time::timeout(
            PUBLISH_TIMEOUT,
            client.request("$SYS.REQ.CLAIMS.UPDATE", account.jwt.clone().into()),
        )
        .await
        .map_err(|_| Error::Transport("claims update request timed out".into()))?
        .map_err(|e| Error::Transport(e.to_string()))?;

        info!(response = %String::from_utf8_lossy(&response.payload), "account published");
        Ok(())
    }

    async fn publish_account_removal(
        &self,
        operator: &Operator,
        sys_user: &User,
        account: &Account,
    ) -> Result<()> {
        let client = self.connect(operator, sys_user).await?;
        info!(account = %account.name, operator = %operator.url, "publishing account removal");

        let claim = GenericClaims::account_deletion(&operator.public_key, &account.public_key);
        let signer = nkeys::KeyPair::from_seed(&operator.sign_seed)?;
        let prune_jwt = crate::keys::sign_claims(&claim, &signer)?;

        let response = tokio::time::timeout(
            PUBLISH_TIMEOUT,
            client.request("$SYS.REQ.CLAIMS.DELETE", prune_jwt.into()),
        )
        .await
        .map_err(|_| Error::Transport("claims delete request timed out".into()))?;

        match response {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "account removal publish failed");
                Err(Error::Transport(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakePublisher {
        pub published: Mutex<Vec<String>>,
        pub removed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn publish_account(&self, _operator: &Operator, _sys_user: &User, account: &Account) -> Result<()> {
            self.published.lock().unwrap().push(account.public_key.clone());
            Ok(())
        }

        async fn publish_account_removal(
            &self,
            _operator: &Operator,
            _sys_user: &User,
            account: &Account,
        ) -> Result<()> {
            self.removed.lock().unwrap().push(account.public_key.clone());
            Ok(())
        }
    }
}
