//! CLI-context file management.
//!
//! One JSON context file per user id, plus a sibling `.creds` file carrying
//! the raw decorated credentials, both written `0600`. A `selected` pointer
//! file names the active context. Grounded in idiom (not content) on
//! `avenactl`'s `Manifest`/`Context` file handling, adapted from TOML to
//! JSON per-user files since there is no single manifest here.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::Result;
use crate::store::entities::{Account, Operator, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFile {
    pub url: String,
    pub description: String,
}

#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn upsert(&self, operator: &Operator, account: &Account, user: &User) -> Result<()>;
    async fn remove(&self, user_id: &str) -> Result<()>;
    async fn selected(&self) -> Result<Option<String>>;
    async fn known(&self) -> Result<Vec<String>>;
    async fn select(&self, user_id: &str) -> Result<()>;
}

pub struct FsContextStore {
    dir: PathBuf,
}

impl FsContextStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn context_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{user_id}.json"))
    }

    fn creds_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{user_id}.creds"))
    }

    fn selected_path(&self) -> PathBuf {
        self.dir.join("selected")
    }

    async fn write_private(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(path, contents).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContextStore for FsContextStore {
    async fn upsert(&self, operator: &Operator, account: &Account, user: &User) -> Result<()> {
        let description = format!(
            "{} - {} - User {}({}) for account {}",
            operator.url, operator.description, user.name, user.id, account.name
        );
        let context = ContextFile {
            url: operator.url.clone(),
            description,
        };
        let body = serde_json::to_vec_pretty(&context)?;
        self.write_private(&self.context_path(&user.id), &body).await?;
        self.write_private(&self.creds_path(&user.id), user.creds.as_bytes()).await?;
        Ok(())
    }

    async fn remove(&self, user_id: &str) -> Result<()> {
        let _ = fs::remove_file(self.context_path(user_id)).await;
        let _ = fs::remove_file(self.creds_path(user_id)).await;
        if self.selected().await?.as_deref() == Some(user_id) {
            let remaining: Vec<String> = self.known().await?.into_iter().filter(|id| id != user_id).collect();
            match remaining.first() {
                Some(next) => self.select(next).await?,
                None => {
                    let _ = fs::remove_file(self.selected_path()).await;
                }
            }
        }
        Ok(())
    }

    async fn selected(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.selected_path()).await {
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn known(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                    ids.push(name.to_string());
                }
            }
        }
        Ok(ids)
    }

    async fn select(&self, user_id: &str) -> Result<()> {
        self.write_private(&self.selected_path(), user_id.as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator() -> Operator {
        Operator {
            id: "op1".into(),
            url: "nats://localhost:4222".into(),
            description: "test cluster".into(),
            public_key: "OPUB".into(),
            private_key: "opriv".into(),
            seed: "oseed".into(),
            jwt: "ojwt".into(),
            sign_public_key: "OSIGNPUB".into(),
            sign_private_key: "osignpriv".into(),
            sign_seed: "osignseed".into(),
        }
    }

    fn account() -> Account {
        Account {
            id: "acc1".into(),
            name: "demo".into(),
            description: String::new(),
            operator: "op1".into(),
            public_key: "ACCPUB".into(),
            private_key: "accpriv".into(),
            seed: "accseed".into(),
            jwt: "accjwt".into(),
            sign_public_key: "ASIGNPUB".into(),
            sign_private_key: "asignpriv".into(),
            sign_seed: "asignseed".into(),
            limits: String::new(),
            revocations: Vec::new(),
        }
    }

    fn user(id: &str) -> User {
        User {
            id: id.into(),
            name: "alice".into(),
            description: String::new(),
            account: "acc1".into(),
            bearer: false,
            public_key: "UPUB".into(),
            private_key: "upriv".into(),
            seed: "useed".into(),
            jwt: "ujwt".into(),
            creds: "-----BEGIN NATS USER JWT-----\nujwt\n".into(),
        }
    }

    #[tokio::test]
    async fn upsert_writes_context_and_creds() {
        let dir = tempdir();
        let store = FsContextStore::new(dir.clone());
        store.upsert(&operator(), &account(), &user("u1")).await.unwrap();

        let ctx: ContextFile = serde_json::from_slice(&tokio::fs::read(dir.join("u1.json")).await.unwrap()).unwrap();
        assert_eq!(ctx.url, "nats://localhost:4222");
        let creds = tokio::fs::read_to_string(dir.join("u1.creds")).await.unwrap();
        assert!(creds.contains("ujwt"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn removing_selected_context_reassigns() {
        let dir = tempdir();
        let store = FsContextStore::new(dir.clone());
        store.upsert(&operator(), &account(), &user("u1")).await.unwrap();
        store.upsert(&operator(), &account(), &user("u2")).await.unwrap();
        store.select("u1").await.unwrap();

        store.remove("u1").await.unwrap();
        let selected = store.selected().await.unwrap();
        assert_eq!(selected.as_deref(), Some("u2"));

        let _ = std::fs::remove_dir_all(dir);
    }

    fn tempdir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("natsctl-cli-context-test-{}", uuid::Uuid::new_v4()));
        dir
    }
}
