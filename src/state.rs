use std::sync::Arc;

use crate::clients::currency::{CurrencyApiClient, ExchangeRateProvider};
use crate::clients::mailer::{self, Mailer};
use crate::clients::stripe::{PaymentProvider, StripeClient};
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, CourseService, LessonService, PaymentService, SeaOrmAuthService,
    SeaOrmCourseService, SeaOrmLessonService, SeaOrmPaymentService, SeaOrmSubscriptionService,
    SeaOrmUserService, SubscriptionService, TaskQueue, TokenCodec, UserService,
};

/// Outbound integrations. Swapped for doubles in tests.
#[derive(Clone)]
pub struct ExternalClients {
    pub rates: Arc<dyn ExchangeRateProvider>,
    pub payments: Arc<dyn PaymentProvider>,
    pub mailer: Arc<dyn Mailer>,
}

impl ExternalClients {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            rates: Arc::new(CurrencyApiClient::new(&config.currency)?),
            payments: Arc::new(StripeClient::new(&config.stripe)?),
            mailer: mailer::from_config(&config.email)?,
        })
    }
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub tokens: TokenCodec,

    pub tasks: TaskQueue,

    pub auth_service: Arc<dyn AuthService>,

    pub user_service: Arc<dyn UserService>,

    pub course_service: Arc<dyn CourseService>,

    pub lesson_service: Arc<dyn LessonService>,

    pub subscription_service: Arc<dyn SubscriptionService>,

    pub payment_service: Arc<dyn PaymentService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let clients = ExternalClients::from_config(&config)?;
        Self::with_clients(config, clients).await
    }

    /// Builds the state around the given integrations. Starts the background
    /// task worker, which lives as long as any clone of the state.
    pub async fn with_clients(config: Config, clients: ExternalClients) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let tokens = TokenCodec::new(&config.auth);
        let (tasks, _worker) = TaskQueue::start(
            clients.mailer.clone(),
            config.tasks.clone(),
            config.email.max_concurrent_sends,
        );

        let auth_service = Arc::new(SeaOrmAuthService::new(store.clone(), tokens.clone()))
            as Arc<dyn AuthService + Send + Sync + 'static>;

        let user_service = Arc::new(SeaOrmUserService::new(
            store.clone(),
            config.security.clone(),
        )) as Arc<dyn UserService + Send + Sync + 'static>;

        let course_service = Arc::new(SeaOrmCourseService::new(store.clone(), tasks.clone()))
            as Arc<dyn CourseService + Send + Sync + 'static>;

        let lesson_service = Arc::new(SeaOrmLessonService::new(store.clone()))
            as Arc<dyn LessonService + Send + Sync + 'static>;

        let subscription_service = Arc::new(SeaOrmSubscriptionService::new(store.clone()))
            as Arc<dyn SubscriptionService + Send + Sync + 'static>;

        let payment_service = Arc::new(SeaOrmPaymentService::new(
            store.clone(),
            clients.rates,
            clients.payments,
            &config.currency,
            &config.stripe,
        )) as Arc<dyn PaymentService + Send + Sync + 'static>;

        Ok(Self {
            config: Arc::new(config),
            store,
            tokens,
            tasks,
            auth_service,
            user_service,
            course_service,
            lesson_service,
            subscription_service,
            payment_service,
        })
    }
}
