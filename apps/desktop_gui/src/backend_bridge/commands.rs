//! Backend commands queued from UI to backend worker.

pub enum BackendCommand {
    /// Point the worker at a backend; replaces any previous client.
    Configure { server_url: String },
    /// Run the greeting form submit handler against the shared form model.
    Submit,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::Configure { .. } => "configure",
            BackendCommand::Submit => "submit",
        }
    }
}
