use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, create_orm_conn, pool_from_orm},
    integrations::{
        crawler::ExhibitionCrawler,
        mailer::Mailer,
        payos::PayosClient,
        storage::{SharedStorage, build_storage},
        watermark::Watermarker,
    },
    realtime::NotificationHub,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub storage: SharedStorage,
    pub mailer: Option<Mailer>,
    pub payos: Option<PayosClient>,
    pub watermarker: Option<Arc<Watermarker>>,
    pub crawler: Option<Arc<ExhibitionCrawler>>,
    pub hub: NotificationHub,
}

impl AppState {
    /// Connects to the database and builds every configured integration.
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let orm = create_orm_conn(&config.database_url).await?;
        let storage = build_storage(&config.storage).await?;
        Self::with_parts(config, orm, storage).await
    }

    pub async fn with_parts(
        config: AppConfig,
        orm: OrmConn,
        storage: SharedStorage,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("art-marketplace-api/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        let mailer = config.smtp.as_ref().map(Mailer::new).transpose()?;
        if mailer.is_none() {
            tracing::info!("SMTP not configured, emails are disabled");
        }
        let payos = config
            .payos
            .clone()
            .map(|payos| PayosClient::new(http.clone(), payos));
        let watermarker = Watermarker::load(&config.watermark).await?.map(Arc::new);
        if watermarker.is_none() {
            tracing::warn!("WATERMARK_FONT_PATH not set, watermarked images are unavailable");
        }
        let crawler = config
            .exhibitions
            .clone()
            .map(|source| Arc::new(ExhibitionCrawler::new(http.clone(), source)));

        Ok(Self {
            pool: pool_from_orm(&orm),
            orm,
            config: Arc::new(config),
            storage,
            mailer,
            payos,
            watermarker,
            crawler,
            hub: NotificationHub::default(),
        })
    }
}
