//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::checkout::{CheckoutService, PaymentGateway, RazorpayClient};
use crate::config::StudioConfig;
use crate::db::{
    PgSettingsStore, PgStyleRepository, PgTransactionStore, SettingsStore, StyleCatalog,
    TransactionStore,
};
use crate::generation::{Dispatcher, GeminiClient, ImageProvider, KlingClient, VideoProvider};
use crate::models::AdminSettings;

/// Outbound HTTP timeout. Image generation can take close to a minute.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Error creating application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// The swappable services behind the state.
///
/// Production wiring comes from [`AppState::new`]; tests assemble this
/// directly with in-memory stores and fake providers.
pub struct Services {
    pub settings: Arc<dyn SettingsStore>,
    pub styles: StyleCatalog,
    pub transactions: Arc<dyn TransactionStore>,
    pub image_provider: Arc<dyn ImageProvider>,
    pub video_provider: Arc<dyn VideoProvider>,
    pub gateway: Arc<dyn PaymentGateway>,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StudioConfig,
    pool: Option<PgPool>,
    settings: Arc<dyn SettingsStore>,
    styles: StyleCatalog,
    transactions: Arc<dyn TransactionStore>,
    dispatcher: Dispatcher,
    video_provider: Arc<dyn VideoProvider>,
    checkout: CheckoutService,
}

impl AppState {
    /// Wire production services around a database pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StudioConfig, pool: PgPool) -> Result<Self, StateError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let defaults = AdminSettings::defaults(&config.payment);

        let services = Services {
            settings: Arc::new(PgSettingsStore::new(pool.clone(), defaults)),
            styles: StyleCatalog::new(Arc::new(PgStyleRepository::new(pool.clone()))),
            transactions: Arc::new(PgTransactionStore::new(pool.clone())),
            image_provider: Arc::new(GeminiClient::new(http.clone(), &config.gemini)),
            video_provider: Arc::new(KlingClient::new(http.clone(), &config.video)),
            gateway: Arc::new(RazorpayClient::new(http, &config.payment.razorpay_base_url)),
        };

        Ok(Self::from_services(config, Some(pool), services))
    }

    /// Assemble state from explicit services.
    #[must_use]
    pub fn from_services(config: StudioConfig, pool: Option<PgPool>, services: Services) -> Self {
        let checkout = CheckoutService::new(
            services.settings.clone(),
            services.transactions.clone(),
            services.gateway,
            config.payment.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                pool,
                settings: services.settings,
                styles: services.styles,
                transactions: services.transactions,
                dispatcher: Dispatcher::new(services.image_provider),
                video_provider: services.video_provider,
                checkout,
                config,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StudioConfig {
        &self.inner.config
    }

    /// The database pool, absent when running on in-memory stores.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.inner.settings
    }

    #[must_use]
    pub fn styles(&self) -> &StyleCatalog {
        &self.inner.styles
    }

    #[must_use]
    pub fn transactions(&self) -> &Arc<dyn TransactionStore> {
        &self.inner.transactions
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    #[must_use]
    pub fn video_provider(&self) -> &Arc<dyn VideoProvider> {
        &self.inner.video_provider
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }
}
