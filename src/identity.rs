use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

use crate::engine::EngineError;
use crate::limits::{MAX_ACCOUNTS, MAX_TOKEN_LEN};
use crate::model::*;

/// The authenticated caller, passed explicitly into every use case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account_id: AccountId,
    pub email: String,
    pub role: Role,
}

/// Resolves a bearer token into the caller's identity.
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, token: Option<&str>) -> Result<Identity, EngineError>;
}

/// Resolves an account id into the full account record.
#[async_trait]
pub trait AccountLookup: Send + Sync {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, EngineError>;
}

/// One entry of the accounts file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEntry {
    pub id: AccountId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub token: String,
}

struct Credential {
    account_id: AccountId,
    role: Role,
}

/// In-memory account and token table. Registration and token issuance live
/// elsewhere; this only answers lookups.
pub struct AccountDirectory {
    accounts: DashMap<AccountId, Account>,
    tokens: DashMap<String, Credential>,
    /// Account → its current token, so reissuing revokes the old one.
    issued: DashMap<AccountId, String>,
}

impl Default for AccountDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountDirectory {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            tokens: DashMap::new(),
            issued: DashMap::new(),
        }
    }

    /// Register or replace `account`. Its previous token, if different, stops resolving.
    /// A token already issued to another account is refused.
    pub fn insert(&self, account: Account, role: Role, token: impl Into<String>) -> Result<(), EngineError> {
        let token = token.into();
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(EngineError::LimitExceeded("token length"));
        }
        if self.accounts.len() >= MAX_ACCOUNTS && !self.accounts.contains_key(&account.id) {
            return Err(EngineError::LimitExceeded("too many accounts"));
        }
        if let Some(holder) = self.tokens.get(&token).map(|c| c.account_id) {
            if holder != account.id {
                return Err(EngineError::Config(format!(
                    "account {}: token already issued to account {holder}",
                    account.id
                )));
            }
        }
        if let Some(previous) = self.issued.insert(account.id, token.clone()) {
            if previous != token {
                self.tokens.remove(&previous);
            }
        }
        self.tokens.insert(
            token,
            Credential {
                account_id: account.id,
                role,
            },
        );
        self.accounts.insert(account.id, account);
        Ok(())
    }

    pub fn from_entries(entries: Vec<AccountEntry>) -> Result<Self, EngineError> {
        let dir = Self::new();
        for e in entries {
            let account = Account {
                id: e.id,
                first_name: e.first_name,
                last_name: e.last_name,
                email: e.email,
            };
            dir.insert(account, e.role, e.token)?;
        }
        Ok(dir)
    }

    /// Load a JSON array of account entries.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("reading {}: {e}", path.display())))?;
        let entries: Vec<AccountEntry> = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("parsing {}: {e}", path.display())))?;
        Self::from_entries(entries)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl IdentityProvider for AccountDirectory {
    fn resolve(&self, token: Option<&str>) -> Result<Identity, EngineError> {
        let token = token.ok_or(EngineError::Unauthenticated)?;
        let cred = self.tokens.get(token).ok_or(EngineError::Unauthenticated)?;
        let email = self
            .accounts
            .get(&cred.account_id)
            .map(|a| a.email.clone())
            .unwrap_or_default();
        Ok(Identity {
            account_id: cred.account_id,
            email,
            role: cred.role,
        })
    }
}

#[async_trait]
impl AccountLookup for AccountDirectory {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, EngineError> {
        Ok(self.accounts.get(&id).map(|e| e.value().clone()))
    }
}
