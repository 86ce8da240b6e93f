use std::sync::Arc;

use course_core::model::CourseSlug;
use reqwest::Client;
use storage::repository::Storage;
use url::Url;

use crate::Clock;
use crate::api::{CourseApi, HttpCourseApi};
use crate::assessment::AssessmentController;
use crate::cache::LocalCache;
use crate::config::ClientConfig;
use crate::drafts::DraftService;
use crate::error::AppServicesError;
use crate::gateway::{Credentials, Gateway};
use crate::media_progress::MediaProgressTracker;
use crate::progression::ProgressionController;
use crate::rate_limit::{RateLimitBreaker, ThrottleSignal};
use crate::shell::Shell;
use crate::tasks::ScopedTask;

/// Assembles the gateway, breaker, cache and controllers from one config.
#[derive(Clone)]
pub struct AppServices {
    config: ClientConfig,
    clock: Clock,
    breaker: Arc<RateLimitBreaker>,
    gateway: Option<Gateway>,
    api: Arc<dyn CourseApi>,
    cache: LocalCache,
    _ticker: Arc<ScopedTask>,
}

impl AppServices {
    /// Build services over HTTP with a `SQLite` cache.
    ///
    /// Must be called inside a Tokio runtime; the breaker's countdown task starts here.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the HTTP client or the cache database cannot be set up.
    pub async fn connect(config: ClientConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.cache_db).await?;
        let breaker = Arc::new(RateLimitBreaker::new());

        let client = Client::builder().timeout(config.http_timeout).build()?;
        let throttle: Arc<dyn ThrottleSignal> = breaker.clone();
        let gateway = Gateway::new(
            client,
            config.base_url.clone(),
            throttle,
            config.rate_limit_fallback.as_secs(),
        );
        gateway.set_credentials(Credentials {
            access: config.access_token.clone(),
            refresh: config.refresh_token.clone(),
        });
        let api: Arc<dyn CourseApi> = Arc::new(HttpCourseApi::new(gateway.clone()));

        Ok(Self::assemble(config, clock, breaker, Some(gateway), api, storage))
    }

    /// Build services around an existing remote API and storage.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn with_api(
        config: ClientConfig,
        clock: Clock,
        api: Arc<dyn CourseApi>,
        storage: Storage,
    ) -> Self {
        Self::assemble(
            config,
            clock,
            Arc::new(RateLimitBreaker::new()),
            None,
            api,
            storage,
        )
    }

    fn assemble(
        config: ClientConfig,
        clock: Clock,
        breaker: Arc<RateLimitBreaker>,
        gateway: Option<Gateway>,
        api: Arc<dyn CourseApi>,
        storage: Storage,
    ) -> Self {
        let ticker = Arc::new(breaker.spawn_ticker());
        Self {
            cache: LocalCache::new(Arc::clone(&storage.cache), clock),
            config,
            clock,
            breaker,
            gateway,
            api,
            _ticker: ticker,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn breaker(&self) -> Arc<RateLimitBreaker> {
        Arc::clone(&self.breaker)
    }

    /// The HTTP gateway, when built by [`AppServices::connect`].
    #[must_use]
    pub fn gateway(&self) -> Option<&Gateway> {
        self.gateway.as_ref()
    }

    #[must_use]
    pub fn api(&self) -> Arc<dyn CourseApi> {
        Arc::clone(&self.api)
    }

    #[must_use]
    pub fn progression(&self, slug: CourseSlug, shell: Arc<dyn Shell>) -> ProgressionController {
        ProgressionController::new(self.api(), shell, slug, self.config.base_url.clone())
            .with_access_ping_delay(self.config.access_ping_delay)
    }

    #[must_use]
    pub fn assessment(&self, shell: Arc<dyn Shell>) -> AssessmentController {
        AssessmentController::new(
            self.api(),
            self.cache.clone(),
            shell,
            self.config.base_url.clone(),
        )
        .with_retry_redirect_delay(self.config.retry_redirect_delay)
    }

    #[must_use]
    pub fn media_progress(&self) -> MediaProgressTracker {
        MediaProgressTracker::new(self.api()).with_interval(self.config.checkpoint_interval)
    }

    #[must_use]
    pub fn drafts(&self) -> DraftService {
        DraftService::new(self.api(), self.cache.clone())
    }
}
