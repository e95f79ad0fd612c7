//! Resolves the viewer of a request: the signed-in user (if any) and whether
//! that user holds the admin role.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use uuid::Uuid;

use crate::domain::{AuthUser, Role};
use crate::ports::{IdentityProvider, ProfileStore};

/// The identity attached to a single request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Viewer {
    pub user: Option<AuthUser>,
    pub display_name: Option<String>,
    /// Authoritative for this request. Fails closed when the role is unknown.
    pub is_admin: bool,
    /// Display-only hint. May come from an earlier confirmed lookup.
    pub admin_hint: bool,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }
}

/// Turns a session token into a [`Viewer`], provisioning the profile on first sight.
///
/// Every outbound lookup is bounded by `timeout`. When the role cannot be read the
/// viewer is not an admin for this request; the last confirmed role is kept as a
/// hint only.
pub struct ViewerResolver {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    timeout: Duration,
    role_hints: Cache<Uuid, bool>,
}

impl ViewerResolver {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        timeout: Duration,
        hint_ttl: Duration,
    ) -> Self {
        Self {
            identity,
            profiles,
            timeout,
            role_hints: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(hint_ttl)
                .build(),
        }
    }

    pub async fn resolve(&self, session_token: Option<&str>) -> Viewer {
        let Some(token) = session_token.filter(|t| !t.is_empty()) else {
            return Viewer::anonymous();
        };

        let user = match tokio::time::timeout(self.timeout, self.identity.current_user(token)).await {
            Ok(Ok(Some(user))) => user,
            Ok(Ok(None)) => return Viewer::anonymous(),
            Ok(Err(e)) => {
                warn!("Failed to resolve session: {:?}", e);
                return Viewer::anonymous();
            }
            Err(_) => {
                warn!("Timed out resolving session after {:?}", self.timeout);
                return Viewer::anonymous();
            }
        };

        match tokio::time::timeout(self.timeout, self.profiles.ensure_profile(&user)).await {
            Ok(Ok(profile)) => {
                let is_admin = profile.role == Role::Admin;
                self.role_hints.insert(user.id, is_admin).await;
                Viewer {
                    display_name: profile.display_name,
                    user: Some(user),
                    is_admin,
                    admin_hint: is_admin,
                }
            }
            Ok(Err(e)) => {
                error!("Failed to load or create profile for user {}: {:?}", user.id, e);
                self.without_role(user).await
            }
            Err(_) => {
                warn!("Timed out loading profile for user {}", user.id);
                self.without_role(user).await
            }
        }
    }

    async fn without_role(&self, user: AuthUser) -> Viewer {
        let admin_hint = self.role_hints.get(&user.id).await.unwrap_or(false);
        Viewer {
            display_name: Some(user.default_display_name()),
            user: Some(user),
            is_admin: false,
            admin_hint,
        }
    }
}
