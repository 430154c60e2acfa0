use std::sync::Arc;

mod backend_bridge;
mod controller;
mod ui;

use clap::Parser;
use client_core::{FailurePolicy, FormModel};
use crossbeam_channel::bounded;
use eframe::egui;

use backend_bridge::commands::BackendCommand;
use controller::events::UiEvent;
use ui::{DesktopGuiApp, StartupConfig};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, env = "BACKEND_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[arg(long, default_value = "")]
    name: String,
    /// Leave the button disabled when a greeting request fails.
    #[arg(long)]
    leave_disabled_on_failure: bool,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let failure_policy = if args.leave_disabled_on_failure {
        FailurePolicy::LeaveDisabled
    } else {
        FailurePolicy::ReenableAndReport
    };

    let form = Arc::new(FormModel::new());
    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(16);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(64);
    backend_bridge::runtime::launch(cmd_rx, ui_tx, form.clone(), failure_policy);

    let startup = StartupConfig {
        server_url: args.server_url,
        initial_name: args.name,
    };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Greeter")
            .with_inner_size([480.0, 200.0])
            .with_min_inner_size([360.0, 160.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Greeter",
        options,
        Box::new(move |_cc| Ok(Box::new(DesktopGuiApp::new(cmd_tx, ui_rx, form, startup)))),
    )
}
