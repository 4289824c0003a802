//! Wiring: opens storage, builds the gateway and controller, runs the dispatcher.

use std::sync::Arc;

use gatekeeper_gateway::{LongPoller, TelegramClient, TelegramConfig};
use gatekeeper_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment};
use gatekeeper_types::SystemClock;
use gatekeeper_verification::PhoneVerifier;

use crate::config::BotConfig;
use crate::controller::{AdmissionController, Stores};
use crate::dispatcher::Dispatcher;
use crate::metrics::AdmissionMetrics;
use crate::shutdown::ShutdownController;
use crate::AdmissionError;

pub struct GatekeeperBot {
    config: BotConfig,
    client: Arc<TelegramClient>,
    dispatcher: Arc<Dispatcher>,
    shutdown: ShutdownController,
    _environment: LmdbEnvironment,
}

impl GatekeeperBot {
    /// Open storage and build every component. Nothing talks to the platform yet.
    pub fn open(config: BotConfig) -> Result<Self, AdmissionError> {
        config.validate()?;
        check_data_dir(&config.data_dir).map_err(AdmissionError::Config)?;

        let environment = LmdbEnvironment::open(&config.data_dir, config.lmdb_map_size)?;
        let report = check_integrity(&environment)?;
        if !report.is_healthy() {
            for error in &report.errors {
                tracing::error!(%error, "integrity check");
            }
            return Err(AdmissionError::Config(format!(
                "database at {} failed its integrity check",
                config.data_dir.display()
            )));
        }
        tracing::info!(
            databases = report.databases_checked,
            entries = report.total_entries,
            "database integrity verified"
        );

        let stores = Stores {
            verification: Arc::new(environment.verification_store()),
            ledger: Arc::new(environment.join_request_store()),
            groups: Arc::new(environment.group_store()),
        };

        let bot_token = config
            .bot_token
            .clone()
            .ok_or(AdmissionError::MissingCredential("bot_token"))?;
        let client = Arc::new(TelegramClient::new(&TelegramConfig {
            api_base_url: config.api_base_url.clone(),
            bot_token,
            request_timeout: config.request_timeout(),
        })?);

        let verifier = PhoneVerifier::with_default_region(&config.default_region)
            .map_err(|e| AdmissionError::Config(e.to_string()))?;
        let metrics = Arc::new(AdmissionMetrics::new()?);

        let controller = AdmissionController::new(
            stores,
            client.clone(),
            verifier,
            Arc::new(SystemClock),
            config.admin(),
            metrics,
        );
        if controller.seed_default_policy(&config.default_allowed_regions)? {
            tracing::info!(regions = ?config.default_allowed_regions, "seeded default region policy");
        }
        let groups = controller.refresh_registry()?;
        tracing::info!(groups, "group registry loaded");

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(controller),
            config.registry_refresh_secs,
        ));

        Ok(Self {
            config,
            client,
            dispatcher,
            shutdown: ShutdownController::new(),
            _environment: environment,
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownController {
        self.shutdown.clone()
    }

    pub fn controller(&self) -> &Arc<AdmissionController> {
        self.dispatcher.controller()
    }

    /// Check the token, then poll until SIGINT/SIGTERM.
    pub async fn run(self) -> Result<(), AdmissionError> {
        let me = self.client.get_me().await?;
        tracing::info!(
            bot_id = %me.id,
            username = me.username.as_deref().unwrap_or_default(),
            admin_id = %self.config.admin(),
            "connected to bot API"
        );

        let signals = self.shutdown.clone();
        tokio::spawn(async move { signals.wait_for_signal().await });

        let poller = LongPoller::new(self.client.clone(), self.config.poll_timeout_secs);
        Arc::clone(&self.dispatcher)
            .run(poller, self.shutdown.subscribe())
            .await;

        let metrics = self.controller().metrics();
        match metrics.encode() {
            Ok(exposition) => tracing::debug!(%exposition, "final metrics"),
            Err(e) => tracing::warn!(error = %e, "could not encode final metrics"),
        }
        tracing::info!(metrics = %metrics.summary(), "bot stopped");
        Ok(())
    }
}
