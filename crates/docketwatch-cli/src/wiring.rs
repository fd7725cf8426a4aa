//! Build the orchestrator and scheduler from a [`Config`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use docketwatch_core::{Crm, FormSubmitter, Notifier, SystemClock, Unconfigured, Uploader};
use docketwatch_host::{
    Collaborators, Orchestrator, OrchestratorParts, RuntimeState, Scheduler, SideEffectPipeline,
    Sources,
};
use docketwatch_store::{
    MATTERS_FILE, MatterRegistry, PROCESSED_STATE_FILE, ProcessedStateStore, STATUS_FILE,
    StatusFile,
};
use docketwatch_sync::{
    CrmClient, EmailRelayNotifier, FormAutomationClient, HttpSettings, PatentRegistryClient,
    StorageClient, TrademarkRegistryClient,
};
use tracing::info;

use crate::config::{Config, RegistryConfig, ServiceConfig};

/// The long-lived pieces shared by the CLI commands and the HTTP surface.
#[derive(Clone)]
pub struct App {
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Arc<Scheduler>,
}

impl App {
    pub fn build(config: &Config) -> anyhow::Result<Self> {
        let orchestrator = Arc::new(build_orchestrator(config)?);
        let scheduler = Arc::new(Scheduler::new(
            orchestrator.clone(),
            config.schedule.cadence()?,
        ));
        Ok(Self {
            orchestrator,
            scheduler,
        })
    }
}

pub fn registry(config: &Config) -> MatterRegistry {
    MatterRegistry::open(config.data.dir.join(MATTERS_FILE))
}

pub fn state_store(config: &Config) -> ProcessedStateStore {
    ProcessedStateStore::new(config.data.dir.join(PROCESSED_STATE_FILE))
}

fn build_orchestrator(config: &Config) -> anyhow::Result<Orchestrator> {
    let sources = Sources {
        patent: Arc::new(
            PatentRegistryClient::new(&registry_settings(&config.patent))
                .context("building patent registry client")?,
        ),
        trademark: Arc::new(
            TrademarkRegistryClient::new(&registry_settings(&config.trademark))
                .context("building trademark registry client")?,
        ),
    };

    let uploader: Arc<dyn Uploader> = match service_settings(&config.storage) {
        Some(s) => Arc::new(StorageClient::new(&s).context("building storage client")?),
        None => Arc::new(Unconfigured("storage")),
    };
    let crm: Arc<dyn Crm> = match service_settings(&config.crm) {
        Some(s) => Arc::new(CrmClient::new(&s).context("building CRM client")?),
        None => Arc::new(Unconfigured("crm")),
    };
    let forms: Arc<dyn FormSubmitter> = match service_settings(&config.forms) {
        Some(s) => Arc::new(FormAutomationClient::new(&s).context("building form client")?),
        None => Arc::new(Unconfigured("form automation")),
    };
    let notify = &config.notify;
    let notifier: Arc<dyn Notifier> = match configured(&notify.base_url) {
        Some(base) => {
            let settings = HttpSettings::new(base)
                .with_token(notify.token.clone())
                .with_timeout(Duration::from_secs(notify.timeout_secs));
            Arc::new(
                EmailRelayNotifier::new(&settings, notify.from.clone(), notify.to.clone())
                    .context("building notifier")?,
            )
        }
        None => Arc::new(Unconfigured("notifications")),
    };

    info!(
        data_dir = %config.data.dir.display(),
        storage = config.storage.base_url.is_some(),
        crm = config.crm.base_url.is_some(),
        forms = config.forms.base_url.is_some(),
        notify = config.notify.base_url.is_some(),
        "collaborators configured"
    );

    let pipeline = SideEffectPipeline::new(
        Collaborators {
            uploader,
            notifier,
            crm,
            forms,
        },
        config.sweep.form_timeout(),
    );

    Ok(Orchestrator::new(OrchestratorParts {
        registry: registry(config),
        state_store: state_store(config),
        status_file: StatusFile::new(config.data.dir.join(STATUS_FILE)),
        sources,
        pipeline,
        clock: Arc::new(SystemClock),
        runtime: Arc::new(RuntimeState::new()),
        config: config.sweep.orchestrator(),
    }))
}

fn configured(base_url: &Option<String>) -> Option<&str> {
    base_url.as_deref().map(str::trim).filter(|b| !b.is_empty())
}

fn registry_settings(registry: &RegistryConfig) -> HttpSettings {
    HttpSettings::new(registry.base_url.clone())
        .with_token(registry.api_key.clone())
        .with_timeout(Duration::from_secs(registry.timeout_secs))
}

fn service_settings(service: &ServiceConfig) -> Option<HttpSettings> {
    configured(&service.base_url).map(|base| {
        HttpSettings::new(base)
            .with_token(service.token.clone())
            .with_timeout(Duration::from_secs(service.timeout_secs))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_with_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.data.dir = tmp.path().to_path_buf();
        config.patent.base_url = "http://127.0.0.1:9".into();
        config.trademark.base_url = "http://127.0.0.1:9".into();

        let app = App::build(&config).unwrap();
        assert!(!app.scheduler.is_running());
        assert!(app.orchestrator.registry().list().unwrap().is_empty());
    }

    #[test]
    fn blank_base_url_is_unconfigured() {
        let service = ServiceConfig {
            base_url: Some("  ".into()),
            ..ServiceConfig::default()
        };
        assert!(service_settings(&service).is_none());
    }
}
