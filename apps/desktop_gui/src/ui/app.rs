use std::{sync::Arc, time::Duration};

use client_core::{FormModel, FormSnapshot};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::{
    events::{UiError, UiEvent},
    orchestration::dispatch_backend_command,
};

#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub server_url: String,
    pub initial_name: String,
}

pub struct DesktopGuiApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    form: Arc<FormModel>,
    name_input: String,
    status: String,
    last_error: Option<UiError>,
    /// Set between queueing a submit and the worker reporting back.
    submit_queued: bool,
}

impl DesktopGuiApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        form: Arc<FormModel>,
        startup: StartupConfig,
    ) -> Self {
        form.set_name(startup.initial_name.clone());
        let mut app = Self {
            cmd_tx,
            ui_rx,
            form,
            name_input: startup.initial_name,
            status: "Starting...".to_string(),
            last_error: None,
            submit_queued: false,
        };
        let server_url = startup.server_url;
        dispatch_backend_command(
            &app.cmd_tx,
            BackendCommand::Configure { server_url },
            &mut app.status,
        );
        app
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Info(message) => self.status = message,
                UiEvent::SubmitFinished(flow) => {
                    tracing::debug!(?flow, "submit handler finished");
                    self.submit_queued = false;
                }
                UiEvent::Error(err) => {
                    self.submit_queued = false;
                    self.status = err.display_text();
                    self.last_error = Some(err);
                }
            }
        }
    }

    fn submit_enabled(&self, snapshot: &FormSnapshot) -> bool {
        !snapshot.submit_disabled && !self.submit_queued
    }

    fn request_submit(&mut self) {
        self.form.set_name(self.name_input.clone());
        self.last_error = None;
        self.submit_queued =
            dispatch_backend_command(&self.cmd_tx, BackendCommand::Submit, &mut self.status);
    }

    fn show_form(&mut self, ctx: &egui::Context) {
        let snapshot = self.form.snapshot();
        let can_submit = self.submit_enabled(&snapshot);
        let mut submit = false;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Greeter");
            ui.add_space(8.0);

            ui.horizontal(|ui| {
                ui.label("Name");
                let response = ui.text_edit_singleline(&mut self.name_input);
                if response.changed() {
                    self.form.set_name(self.name_input.clone());
                }
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    submit = true;
                }
                if ui
                    .add_enabled(can_submit, egui::Button::new("Click Me!"))
                    .clicked()
                {
                    submit = true;
                }
            });

            ui.add_space(8.0);
            if let Some(greeting) = &snapshot.greeting {
                ui.label(greeting);
            }
            if let Some(error) = &snapshot.error {
                ui.colored_label(ui.visuals().error_fg_color, error);
            }
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            match &self.last_error {
                Some(err) => ui.colored_label(ui.visuals().warn_fg_color, err.display_text()),
                None => ui.small(&self.status),
            };
        });

        // Enter on a disabled form is ignored like a click on a disabled button.
        if submit && can_submit {
            self.request_submit();
        }
    }
}

impl eframe::App for DesktopGuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();
        self.show_form(ctx);

        if self.submit_queued || self.form.snapshot().submit_disabled {
            ctx.request_repaint_after(Duration::from_millis(16));
        } else {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::events::UiErrorContext;
    use client_core::{EventFlow, SubmitControl};
    use crossbeam_channel::bounded;

    fn app_with_queue(capacity: usize) -> (DesktopGuiApp, Receiver<BackendCommand>, Sender<UiEvent>) {
        let (cmd_tx, cmd_rx) = bounded(capacity);
        let (ui_tx, ui_rx) = bounded(8);
        let app = DesktopGuiApp::new(
            cmd_tx,
            ui_rx,
            Arc::new(FormModel::new()),
            StartupConfig {
                server_url: "http://localhost:9000".to_string(),
                initial_name: "Alice".to_string(),
            },
        );
        (app, cmd_rx, ui_tx)
    }

    #[test]
    fn startup_configures_backend_and_seeds_name() {
        let (app, cmd_rx, _ui_tx) = app_with_queue(4);

        match cmd_rx.try_recv() {
            Ok(BackendCommand::Configure { server_url }) => {
                assert_eq!(server_url, "http://localhost:9000")
            }
            _ => panic!("expected configure command"),
        }
        assert_eq!(app.form.snapshot().name, "Alice");
    }

    #[test]
    fn submit_is_blocked_until_worker_reports_back() {
        let (mut app, cmd_rx, ui_tx) = app_with_queue(4);
        let _ = cmd_rx.try_recv();

        app.name_input = "Bob".to_string();
        app.request_submit();
        assert!(matches!(cmd_rx.try_recv(), Ok(BackendCommand::Submit)));
        assert_eq!(app.form.snapshot().name, "Bob");
        assert!(!app.submit_enabled(&app.form.snapshot()));

        ui_tx
            .try_send(UiEvent::SubmitFinished(EventFlow::Stop))
            .expect("send");
        app.process_ui_events();
        assert!(app.submit_enabled(&app.form.snapshot()));
    }

    #[test]
    fn disabled_control_blocks_submit() {
        let (app, _cmd_rx, _ui_tx) = app_with_queue(4);
        app.form.set_disabled(true);
        assert!(!app.submit_enabled(&app.form.snapshot()));
    }

    #[test]
    fn worker_errors_surface_in_status() {
        let (mut app, _cmd_rx, ui_tx) = app_with_queue(4);
        ui_tx
            .try_send(UiEvent::Error(UiError::from_message(
                UiErrorContext::Submit,
                "no backend configured; missing server url",
            )))
            .expect("send");

        app.process_ui_events();

        assert!(app.last_error.is_some());
        assert_eq!(app.status, "no backend configured; missing server url");
    }
}
