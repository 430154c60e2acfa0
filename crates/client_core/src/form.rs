//! Greeting form: view seams and the submit handler.
//!
//! The handler never touches a concrete UI. A front-end hands it a name source
//! and a greeting sink up front, and each submit event carries the form it was
//! raised on so the handler can find that form's submit control.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::GreetingService;

pub trait NameSource: Send + Sync {
    /// Current value of the name field, `None` when the form has no such field.
    fn read_name(&self) -> Option<String>;
}

pub trait GreetingSink: Send + Sync {
    fn show_greeting(&self, greeting: &str);
    fn show_error(&self, message: &str);
}

pub trait SubmitControl: Send + Sync {
    fn set_disabled(&self, disabled: bool);
    fn is_disabled(&self) -> bool;
}

pub trait FormTarget: Send + Sync {
    fn submit_control(&self) -> Option<&dyn SubmitControl>;
}

pub struct SubmitEvent<'a> {
    target: &'a dyn FormTarget,
    default_prevented: AtomicBool,
    propagation_stopped: AtomicBool,
}

impl<'a> SubmitEvent<'a> {
    pub fn new(target: &'a dyn FormTarget) -> Self {
        Self {
            target,
            default_prevented: AtomicBool::new(false),
            propagation_stopped: AtomicBool::new(false),
        }
    }

    pub fn target(&self) -> &'a dyn FormTarget {
        self.target
    }

    pub fn prevent_default(&self) {
        self.default_prevented.store(true, Ordering::SeqCst);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::SeqCst)
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.store(true, Ordering::SeqCst);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.load(Ordering::SeqCst)
    }
}

/// What happens to the submit control when the greeting call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Re-enable the control and write the failure to the sink's error slot.
    #[default]
    ReenableAndReport,
    /// Leave the control disabled and the view untouched.
    LeaveDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFlow {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Pending,
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("form has no submit control")]
    MissingSubmitControl,
    #[error("form has no name field")]
    MissingNameField,
    #[error("greeting request failed: {0:#}")]
    Remote(#[source] anyhow::Error),
}

pub struct SubmitHandler {
    service: Arc<dyn GreetingService>,
    name: Arc<dyn NameSource>,
    display: Arc<dyn GreetingSink>,
    policy: FailurePolicy,
    in_flight: AtomicUsize,
}

impl SubmitHandler {
    pub fn new(
        service: Arc<dyn GreetingService>,
        name: Arc<dyn NameSource>,
        display: Arc<dyn GreetingSink>,
    ) -> Self {
        Self {
            service,
            name,
            display,
            policy: FailurePolicy::default(),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> SubmitState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            SubmitState::Pending
        } else {
            SubmitState::Idle
        }
    }

    /// Event-listener entry point. Outcomes go to the sink; the event never
    /// propagates past this handler.
    pub async fn handle_submit(&self, event: &SubmitEvent<'_>) -> EventFlow {
        if let Err(err) = self.submit(event).await {
            warn!(error = %err, "greeting form submission failed");
        }
        event.stop_propagation();
        EventFlow::Stop
    }

    /// Runs one submission and returns the greeting that was displayed.
    ///
    /// The submit control is disabled before the greeting call is issued and
    /// re-enabled after it settles, including when this future is dropped
    /// mid-flight. Under [`FailurePolicy::LeaveDisabled`] a failed call
    /// leaves it disabled.
    pub async fn submit(&self, event: &SubmitEvent<'_>) -> Result<String, FormError> {
        event.prevent_default();

        let control = event
            .target()
            .submit_control()
            .ok_or(FormError::MissingSubmitControl)?;
        let guard = DisabledGuard::engage(control);

        let Some(name) = self.name.read_name() else {
            drop(guard);
            if self.policy == FailurePolicy::ReenableAndReport {
                self.display.show_error(&FormError::MissingNameField.to_string());
            }
            return Err(FormError::MissingNameField);
        };

        let _pending = InFlight::enter(&self.in_flight);
        debug!(name_len = name.len(), "submitting greeting request");

        match self.service.greet(&name).await {
            Ok(greeting) => {
                guard.release();
                self.display.show_greeting(&greeting);
                info!("greeting displayed");
                Ok(greeting)
            }
            Err(err) => {
                let err = FormError::Remote(err);
                match self.policy {
                    FailurePolicy::ReenableAndReport => {
                        guard.release();
                        self.display.show_error(&err.to_string());
                    }
                    FailurePolicy::LeaveDisabled => guard.keep_disabled(),
                }
                Err(err)
            }
        }
    }
}

/// Holds a submit control disabled until released or dropped.
struct DisabledGuard<'a> {
    control: Option<&'a dyn SubmitControl>,
}

impl<'a> DisabledGuard<'a> {
    fn engage(control: &'a dyn SubmitControl) -> Self {
        control.set_disabled(true);
        Self {
            control: Some(control),
        }
    }

    fn release(mut self) {
        if let Some(control) = self.control.take() {
            control.set_disabled(false);
        }
    }

    fn keep_disabled(mut self) {
        self.control = None;
    }
}

impl Drop for DisabledGuard<'_> {
    fn drop(&mut self) {
        if let Some(control) = self.control.take() {
            control.set_disabled(false);
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSnapshot {
    pub name: String,
    pub submit_disabled: bool,
    pub greeting: Option<String>,
    pub error: Option<String>,
}

/// In-memory greeting form shared between a front-end and the handler.
///
/// Front-ends render from [`FormModel::snapshot`] and write the name field
/// with [`FormModel::set_name`].
#[derive(Default)]
pub struct FormModel {
    state: Mutex<FormSnapshot>,
}

impl FormModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        let model = Self::default();
        model.set_name(name);
        model
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.lock().name = name.into();
    }

    pub fn snapshot(&self) -> FormSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, FormSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NameSource for FormModel {
    fn read_name(&self) -> Option<String> {
        Some(self.lock().name.clone())
    }
}

impl GreetingSink for FormModel {
    fn show_greeting(&self, greeting: &str) {
        let mut state = self.lock();
        state.greeting = Some(greeting.to_string());
        state.error = None;
    }

    fn show_error(&self, message: &str) {
        self.lock().error = Some(message.to_string());
    }
}

impl SubmitControl for FormModel {
    fn set_disabled(&self, disabled: bool) {
        self.lock().submit_disabled = disabled;
    }

    fn is_disabled(&self) -> bool {
        self.lock().submit_disabled
    }
}

impl FormTarget for FormModel {
    fn submit_control(&self) -> Option<&dyn SubmitControl> {
        Some(self)
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
