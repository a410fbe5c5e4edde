use {
    crate::{
        config::BanklyConfig,
        http_server::start_http_service,
        models::{Transaction, User},
        repository::{JsonRepository, error::RepositoryError},
        services::{AppServices, TransactionService, UserService},
    },
    std::sync::Arc,
    tokio::signal::ctrl_c,
    tracing::{error, info},
};

pub mod config;
pub mod http_server;
pub mod logging;
mod macros;
pub mod metrics;
pub mod models;
pub mod persistence;
pub mod repository;
pub mod services;

pub struct Bankly {
    pub config: BanklyConfig,
    pub services: Arc<AppServices>,
}

impl Bankly {
    /// Opens both collection files once and wires the long-lived services on
    /// top of them.
    pub fn new(config: BanklyConfig) -> Result<Self, RepositoryError> {
        let user_repository = JsonRepository::<User>::open(config.persistence.users_file())?;
        let transaction_repository =
            JsonRepository::<Transaction>::open(config.persistence.transactions_file())?;

        let transactions = TransactionService::new(Arc::new(transaction_repository));
        let users = UserService::new(Arc::new(user_repository), transactions.clone());

        Ok(Bankly {
            config,
            services: Arc::new(AppServices {
                users,
                transactions,
            }),
        })
    }

    /// Runs until Ctrl-C. Errors if the HTTP service fails or stops on its own.
    pub async fn run(&self) -> Result<(), String> {
        let (shutdown_sender, _) = tokio::sync::broadcast::channel::<()>(1);
        let mut services = tokio::task::JoinSet::new();

        info!(
            "Initializing with {} users and {} transactions",
            self.services.users.get_all().map_err(|e| e.to_string())?.len(),
            self.services
                .transactions
                .get_all()
                .map_err(|e| e.to_string())?
                .len()
        );

        {
            let http_services = Arc::clone(&self.services);
            let http_config = self.config.http.clone();
            let shutdown_receiver = shutdown_sender.subscribe();
            services.spawn(async move {
                start_http_service(http_config, http_services, shutdown_receiver).await
            })
        };

        tokio::select! {
            _ = ctrl_c() => {
                tracing::info!("Shutdown signal received, stopping services...");
                shutdown_sender.send(()).map_err(|e| e.to_string())?;
                while let Some(res) = services.join_next().await {
                    res.map_err(|e| e.to_string())?.map_err(|e| e.to_string())?;
                }
                // Every write already reached disk; nothing to flush here.
                tracing::info!("Services stopped");
                Ok(())
            }
            Some(res) = services.join_next() => {
                let reason = match res {
                    Ok(Ok(())) => "stopped without a shutdown signal".to_string(),
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => e.to_string(),
                };
                error!("HTTP service exited unexpectedly: {}", reason);
                Err(format!("HTTP service exited unexpectedly: {reason}"))
            }
        }
    }
}
