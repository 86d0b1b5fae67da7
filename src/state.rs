use std::sync::Arc;

use crate::config::Config;
use crate::identity::IdentityProvider;
use crate::rate_limit::ClientRateLimiter;
use crate::reset::flow::ResetFlow;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityProvider>,
    pub reset: Arc<ResetFlow>,
    pub api_limiter: Arc<ClientRateLimiter>,
    pub reset_limiter: Arc<ClientRateLimiter>,
}
