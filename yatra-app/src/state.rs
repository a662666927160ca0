use std::sync::Arc;
use yatra_catalog::FareEngine;
use yatra_core::{BookingBackend, PaymentGateway, SessionProvider, SimulatedWalletGateway};
use yatra_order::{
    BookingPipeline, DraftPersistence, FileTicketSink, NoPersistence, PaymentProcessor,
    TicketServices,
};
use yatra_store::{Config, FileDraftStore, FileSessionStore, HttpBookingBackend};

/// Everything the booking flow depends on, built once at startup
#[derive(Clone)]
pub struct AppContext {
    pub config: Config,
    pub sessions: Arc<FileSessionStore>,
    pub backend: Arc<dyn BookingBackend>,
    pub processor: Arc<PaymentProcessor>,
    pub fares: FareEngine,
    pub drafts: Arc<dyn DraftPersistence>,
    pub tickets: TicketServices,
}

impl AppContext {
    pub async fn init(config: Config) -> anyhow::Result<Self> {
        let backend = Arc::new(HttpBookingBackend::new(&config.backend)?);
        tracing::info!(base_url = backend.base_url(), "Using booking backend");

        let gateway = Arc::new(SimulatedWalletGateway::new(config.payment.simulated_latency()));
        Self::with_services(config, backend, gateway).await
    }

    /// Build the context around explicit backend and gateway implementations
    pub async fn with_services(
        config: Config,
        backend: Arc<dyn BookingBackend>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> anyhow::Result<Self> {
        let fares = FareEngine::new(config.fares.clone())?;
        let sessions = Arc::new(FileSessionStore::init(&config.session.path).await?);

        let drafts: Arc<dyn DraftPersistence> = if config.drafts.persist {
            Arc::new(FileDraftStore::new(&config.drafts.path))
        } else {
            Arc::new(NoPersistence)
        };

        let processor = Arc::new(
            PaymentProcessor::new(backend.clone(), gateway)
                .with_policy(config.payment.reconciliation)
                .with_gateway_timeout(config.payment.gateway_timeout()),
        );

        let tickets = TicketServices {
            backend: backend.clone(),
            sink: Arc::new(FileTicketSink::new(&config.tickets.output_dir)),
            sessions: sessions.clone() as Arc<dyn SessionProvider>,
        };

        tracing::debug!(
            reconciliation = ?config.payment.reconciliation,
            persist_drafts = config.drafts.persist,
            "Application context ready"
        );

        Ok(Self {
            config,
            sessions,
            backend,
            processor,
            fares,
            drafts,
            tickets,
        })
    }

    pub fn pipeline(&self) -> BookingPipeline {
        BookingPipeline::new(self.fares.clone(), self.drafts.clone())
    }

    /// Sign out and drop the saved session
    pub async fn teardown(&self) -> anyhow::Result<()> {
        self.sessions.teardown().await?;
        Ok(())
    }
}
