//! Device-local session
//!
//! The signed-in account lives only in the local mirror under
//! [`SESSION_KEY`](super::SESSION_KEY); it is never sent to the remote store.

use super::{Mirror, SESSION_KEY};
use crate::error::Result;
use crate::storage::models::{Role, User};
use crate::storage::queries;
use tracing::info;

impl Mirror {
    /// The signed-in account, if any
    pub async fn get_current_user(&self) -> Result<Option<User>> {
        let stored: Option<Option<User>> = queries::get_json(self.db.pool(), SESSION_KEY).await?;
        Ok(stored.flatten())
    }

    /// Store `user` as the session, or clear it with `None`
    pub async fn save_session(&self, user: Option<&User>) -> Result<()> {
        let _guard = self.session.lock().await;
        queries::put_json(self.db.pool(), SESSION_KEY, &user).await
    }

    /// Check credentials against the collection for `role` and start a session
    ///
    /// Returns `None` (and leaves the session alone) when nothing matches.
    pub async fn login(&self, library_id: &str, password: &str, role: Role) -> Result<Option<User>> {
        let accounts = match role {
            Role::Admin => self.get_admins().await,
            Role::User => self.get_users().await,
        };

        let Some(user) = accounts
            .into_iter()
            .find(|u| u.matches_credentials(library_id, password))
        else {
            return Ok(None);
        };

        self.save_session(Some(&user)).await?;
        info!(library_id, role = role.as_str(), "signed in");
        Ok(Some(user))
    }

    /// Register `user` in the collection for its role and sign it in
    pub async fn sign_up(&self, user: User) -> Result<()> {
        match user.role {
            Role::Admin => self.update_admin(user.clone()).await?,
            Role::User => self.update_user(user.clone()).await?,
        }
        self.save_session(Some(&user)).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.save_session(None).await
    }
}
