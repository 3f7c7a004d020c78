//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the lifecycle
//! controller, metrics, and transport together and manages the background
//! server task.

use crate::config::AppConfig;
use crate::metrics::MetricsCollector;
use crate::session::controller::SessionController;
use crate::transport::{self, TransportContext};
use crate::utils::current_timestamp;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Production application state
pub struct AppState {
    config: AppConfig,
    controller: SessionController,
    metrics: Arc<MetricsCollector>,
    started_at: DateTime<Utc>,
    running: Arc<RwLock<bool>>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    server_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    /// Initialize all service components without starting the listener
    pub async fn new(config: AppConfig) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new()?);
        let controller = SessionController::new(config.matching_config(), metrics.clone());

        Ok(Self {
            config,
            controller,
            metrics,
            started_at: current_timestamp(),
            running: Arc::new(RwLock::new(false)),
            shutdown_tx: Mutex::new(None),
            server_task: Mutex::new(None),
        })
    }

    /// Bind the listener and start serving clients
    pub async fn start(&self) -> Result<()> {
        let addr = self.config.listen_addr()?;
        let listener = transport::bind(addr).await?;

        let context = TransportContext::new(
            self.controller.clone(),
            self.metrics.clone(),
            self.config.service.name.clone(),
            self.started_at,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let running = self.running.clone();

        let task = tokio::spawn(async move {
            if let Err(e) = transport::serve(listener, context, shutdown_rx).await {
                error!("Transport server terminated with error: {}", e);
            }
            *running.write().await = false;
        });

        *self.shutdown_tx.lock().await = Some(shutdown_tx);
        *self.server_task.lock().await = Some(task);
        *self.running.write().await = true;

        info!("Service started on {}", addr);
        Ok(())
    }

    /// Signal the server to drain and stop
    pub async fn stop(&self) -> Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.lock().await.take() {
            let _ = shutdown_tx.send(true);
        }

        if let Some(task) = self.server_task.lock().await.take() {
            match tokio::time::timeout(self.config.shutdown_timeout(), task).await {
                Ok(Ok(())) => info!("Transport server stopped"),
                Ok(Err(e)) => warn!("Transport server task failed: {}", e),
                Err(_) => warn!("Transport server did not stop within the shutdown timeout"),
            }
        }

        *self.running.write().await = false;
        Ok(())
    }

    /// Whether the service is currently accepting clients
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Get the lifecycle controller
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Get the metrics collector
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// When this state was created
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
