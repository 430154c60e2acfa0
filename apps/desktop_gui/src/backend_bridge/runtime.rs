//! Runtime bridge between UI command queue and backend event intake.

use std::{sync::Arc, thread};

use client_core::{
    BackendClient, FailurePolicy, FormModel, GreetingService, SubmitEvent, SubmitHandler,
};
use crossbeam_channel::{Receiver, Sender};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

/// Owns the submit handler on the worker thread. The form model is shared
/// with the UI, which renders whatever the handler writes into it.
pub struct BackendWorker {
    form: Arc<FormModel>,
    failure_policy: FailurePolicy,
    handler: Option<SubmitHandler>,
}

impl BackendWorker {
    pub fn new(form: Arc<FormModel>, failure_policy: FailurePolicy) -> Self {
        Self {
            form,
            failure_policy,
            handler: None,
        }
    }

    pub fn install_service(&mut self, service: Arc<dyn GreetingService>) {
        let handler = SubmitHandler::new(service, self.form.clone(), self.form.clone())
            .with_failure_policy(self.failure_policy);
        self.handler = Some(handler);
    }

    pub async fn handle(&mut self, cmd: BackendCommand) -> UiEvent {
        match cmd {
            BackendCommand::Configure { server_url } => match BackendClient::new(&server_url) {
                Ok(client) => {
                    let info = format!("Using backend {}", client.server_url());
                    self.install_service(Arc::new(client));
                    UiEvent::Info(info)
                }
                Err(err) => {
                    tracing::warn!(%server_url, "rejected backend url: {err}");
                    UiEvent::Error(UiError::from_message(
                        UiErrorContext::Configure,
                        err.to_string(),
                    ))
                }
            },
            BackendCommand::Submit => {
                let Some(handler) = &self.handler else {
                    return UiEvent::Error(UiError::from_message(
                        UiErrorContext::Submit,
                        "no backend configured; missing server url",
                    ));
                };
                let event = SubmitEvent::new(self.form.as_ref());
                UiEvent::SubmitFinished(handler.handle_submit(&event).await)
            }
        }
    }
}

pub fn launch(
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
    form: Arc<FormModel>,
    failure_policy: FailurePolicy,
) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let mut worker = BackendWorker::new(form, failure_policy);
            while let Ok(cmd) = cmd_rx.recv() {
                let cmd_name = cmd.name();
                let event = worker.handle(cmd).await;
                if ui_tx.try_send(event).is_err() {
                    tracing::warn!(command = cmd_name, "ui event queue unavailable; dropping event");
                }
            }
            tracing::info!("ui command queue closed; backend worker exiting");
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::events::UiErrorCategory;
    use async_trait::async_trait;
    use client_core::EventFlow;

    struct EchoGreeter;

    #[async_trait]
    impl GreetingService for EchoGreeter {
        async fn greet(&self, name: &str) -> anyhow::Result<String> {
            Ok(format!("Hello, {name}!"))
        }
    }

    struct DownGreeter;

    #[async_trait]
    impl GreetingService for DownGreeter {
        async fn greet(&self, _name: &str) -> anyhow::Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn submit_writes_greeting_into_shared_form() {
        let form = Arc::new(FormModel::with_name("Alice"));
        let mut worker = BackendWorker::new(form.clone(), FailurePolicy::default());
        worker.install_service(Arc::new(EchoGreeter));

        let event = worker.handle(BackendCommand::Submit).await;

        assert!(matches!(event, UiEvent::SubmitFinished(EventFlow::Stop)));
        let snapshot = form.snapshot();
        assert_eq!(snapshot.greeting.as_deref(), Some("Hello, Alice!"));
        assert!(!snapshot.submit_disabled);
    }

    #[tokio::test]
    async fn failed_submit_leaves_form_usable() {
        let form = Arc::new(FormModel::with_name("Alice"));
        let mut worker = BackendWorker::new(form.clone(), FailurePolicy::ReenableAndReport);
        worker.install_service(Arc::new(DownGreeter));

        worker.handle(BackendCommand::Submit).await;

        let snapshot = form.snapshot();
        assert!(!snapshot.submit_disabled);
        assert!(snapshot.error.is_some());
    }

    #[tokio::test]
    async fn submit_before_configure_is_reported() {
        let form = Arc::new(FormModel::with_name("Alice"));
        let mut worker = BackendWorker::new(form.clone(), FailurePolicy::default());

        let event = worker.handle(BackendCommand::Submit).await;

        let UiEvent::Error(err) = event else {
            panic!("expected an error event");
        };
        assert_eq!(err.context(), UiErrorContext::Submit);
        assert!(form.snapshot().greeting.is_none());
    }

    #[tokio::test]
    async fn configure_rejects_unusable_url() {
        let form = Arc::new(FormModel::new());
        let mut worker = BackendWorker::new(form, FailurePolicy::default());

        let event = worker
            .handle(BackendCommand::Configure {
                server_url: "ftp://example.com".to_string(),
            })
            .await;

        let UiEvent::Error(err) = event else {
            panic!("expected an error event");
        };
        assert_eq!(err.context(), UiErrorContext::Configure);
        assert_eq!(err.category(), UiErrorCategory::Validation);
    }

    #[tokio::test]
    async fn configure_accepts_http_url() {
        let form = Arc::new(FormModel::new());
        let mut worker = BackendWorker::new(form, FailurePolicy::default());

        let event = worker
            .handle(BackendCommand::Configure {
                server_url: "http://127.0.0.1:8080/".to_string(),
            })
            .await;

        let UiEvent::Info(info) = event else {
            panic!("expected an info event");
        };
        assert_eq!(info, "Using backend http://127.0.0.1:8080");
    }
}
