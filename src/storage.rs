use std::path::Path;

use sled::{Db, Tree};
use tracing::debug;

use crate::auth::Session;
use crate::error::ApiResult;

const SESSION_TREE: &str = "session";
const ACCESS_TOKEN_KEY: &str = "token";
const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// One named string value in a sled tree (a local-storage slot).
#[derive(Clone)]
pub struct KeyStore {
    tree: Tree,
    key: &'static str,
}

impl KeyStore {
    pub fn new(tree: Tree, key: &'static str) -> Self {
        Self { tree, key }
    }

    pub fn get(&self) -> ApiResult<Option<String>> {
        Ok(self
            .tree
            .get(self.key.as_bytes())?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn set(&self, value: &str) -> ApiResult<()> {
        self.tree.insert(self.key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    pub fn remove(&self) -> ApiResult<()> {
        self.tree.remove(self.key.as_bytes())?;
        Ok(())
    }
}

/// Persistent home of the access and refresh tokens.
///
/// Survives restarts so a returning user is probed with `/api/auth/me` instead of
/// being sent to the login screen.
#[derive(Clone)]
pub struct TokenStore {
    db: Db,
    access: KeyStore,
    refresh: KeyStore,
}

impl TokenStore {
    /// Open or create the sled database at the given path
    pub fn open(path: impl AsRef<Path>) -> ApiResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory store that disappears on drop (tests, one-shot scripts)
    pub fn temporary() -> ApiResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> ApiResult<Self> {
        let tree = db.open_tree(SESSION_TREE)?;
        Ok(Self {
            access: KeyStore::new(tree.clone(), ACCESS_TOKEN_KEY),
            refresh: KeyStore::new(tree, REFRESH_TOKEN_KEY),
            db,
        })
    }

    /// Stored session, if an access token is present.
    pub fn load(&self) -> ApiResult<Option<Session>> {
        let Some(access_token) = self.access.get()? else {
            return Ok(None);
        };
        Ok(Some(Session {
            access_token,
            refresh_token: self.refresh.get()?,
        }))
    }

    pub fn save(&self, session: &Session) -> ApiResult<()> {
        self.access.set(&session.access_token)?;
        match &session.refresh_token {
            Some(token) => self.refresh.set(token)?,
            None => self.refresh.remove()?,
        }
        self.db.flush()?;
        debug!("session tokens saved");
        Ok(())
    }

    /// Removes both tokens.
    pub fn clear(&self) -> ApiResult<()> {
        self.access.remove()?;
        self.refresh.remove()?;
        self.db.flush()?;
        debug!("session tokens cleared");
        Ok(())
    }
}
