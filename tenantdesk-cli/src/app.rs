/// Console context shared by every command
///
/// Bundles the backend, the auth provider, the client-side store and the
/// configuration. Cheap to clone; clones share the store.
///
/// # Example
///
/// ```no_run
/// use tenantdesk_cli::app::Console;
/// use tenantdesk_shared::auth::authorization::Permission;
/// use tenantdesk_shared::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let console = Console::connect(Config::from_env()?).await?;
/// let admin = console.require(Permission::ManageTenants).await?;
/// println!("Signed in as {}", admin.email);
/// # Ok(())
/// # }
/// ```

use crate::demo::demo_backend;
use crate::error::CliResult;
use std::sync::Arc;
use tenantdesk_shared::auth::authorization::{require_permission, require_tenant_access, Permission};
use tenantdesk_shared::auth::session::AuthProvider;
use tenantdesk_shared::backend::{Backend, MockBackend, RestBackend};
use tenantdesk_shared::config::Config;
use tenantdesk_shared::error::{ConsoleError, ConsoleResult};
use tenantdesk_shared::models::user::User;
use tenantdesk_shared::store::AdminStore;
use tenantdesk_worker::simulator::WebhookSimulator;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct Console {
    pub backend: Arc<dyn Backend>,
    pub auth: Arc<dyn AuthProvider>,
    pub store: AdminStore,
    pub config: Arc<Config>,
}

impl Console {
    pub fn new(backend: Arc<dyn Backend>, auth: Arc<dyn AuthProvider>, config: Config) -> Self {
        Console {
            backend,
            auth,
            store: AdminStore::new(),
            config: Arc::new(config),
        }
    }

    /// Connects to the configured backend
    ///
    /// Resumes the session from `SESSION_ACCESS_TOKEN` when it is set.
    pub async fn connect(config: Config) -> ConsoleResult<Self> {
        let rest = Arc::new(RestBackend::new(&config.backend)?);

        if let Some(token) = &config.session.access_token {
            let user = rest.restore_session(token).await?;
            info!(user_id = %user.id, "Resumed session");
        }

        Ok(Self::new(rest.clone(), rest, config))
    }

    /// Console over a mock backend
    pub fn from_mock(backend: MockBackend, config: Config) -> Self {
        let backend = Arc::new(backend);
        Self::new(backend.clone(), backend, config)
    }

    /// Console over the seeded demo backend
    pub fn offline() -> Self {
        debug!("Using the offline demo backend");
        Self::from_mock(demo_backend(), Config::offline())
    }

    /// The signed-in user, loaded into the store on first use
    pub async fn current_user(&self) -> ConsoleResult<User> {
        if let Some(user) = self.store.current_user().await {
            return Ok(user);
        }
        self.store
            .load_current_user(self.backend.as_ref())
            .await
            .ok_or(ConsoleError::NotAuthenticated)
    }

    /// The signed-in user, if allowed to exercise `permission`
    pub async fn require(&self, permission: Permission) -> CliResult<User> {
        let user = self.current_user().await?;
        require_permission(&user, permission)?;
        Ok(user)
    }

    /// Like [`require`](Self::require), and the user must reach `tenant_id`
    pub async fn require_in_tenant(&self, permission: Permission, tenant_id: Uuid) -> CliResult<User> {
        let user = self.require(permission).await?;
        require_tenant_access(&user, tenant_id)?;
        Ok(user)
    }

    /// Webhook simulator with the configured retries and signing secret
    pub fn simulator(&self) -> WebhookSimulator {
        WebhookSimulator::from_config(self.backend.clone(), &self.config.webhooks)
    }

    pub fn password_reset_redirect(&self) -> Option<&str> {
        self.config.session.password_reset_redirect.as_deref()
    }
}
