//! # Stack Convergence
//!
//! Drives one stack from "submitted template" to a terminal state.
//!
//! ## Flow
//!
//! 1. Describe the stack. If it does not exist, create it with the safe
//!    stack policy and `DO_NOTHING` on failure.
//! 2. If it exists, optionally lift the mutation lock (only when
//!    `allow_destructive` is set), then either create, inspect and execute a
//!    change preview or update directly.
//! 3. An update the control plane reports as empty returns
//!    [`ConvergeAction::NoChanges`] without polling.
//! 4. Otherwise poll at a fixed interval until the status maps to a
//!    terminal [`PollAction`]. On failure the failed resource events since
//!    polling started are attached to [`Error::StackFailed`].
//! 5. A lifted lock is restored exactly once, before any error is returned.

pub mod policy;
pub mod poll;
pub mod status;

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::control_plane::{ControlPlane, ResourceChange, StackDescriptor, StackEvent, StackRequest};
use crate::error::{Error, Result};

pub use policy::{safe_policy, unsafe_policy, PolicyGuard};
pub use poll::{ChannelSleeper, PollObserver, Sleeper, ThreadSleeper};
pub use status::{PollAction, StackStatus};

/// Tag written on every stack this crate creates.
pub const CREATED_BY_TAG: (&str, &str) = ("createdBy", "routestack");

const CHANGE_SET_PENDING: [&str; 2] = ["CREATE_PENDING", "CREATE_IN_PROGRESS"];

/// Knobs for one convergence run.
#[derive(Debug, Clone)]
pub struct ConvergeOptions {
    /// Diff through a change preview instead of updating directly
    pub preview_changes: bool,
    /// Lift the mutation lock for this update
    pub allow_destructive: bool,
    pub poll_interval: Duration,
    pub initial_delay: Duration,
}

impl Default for ConvergeOptions {
    fn default() -> Self {
        Self {
            preview_changes: false,
            allow_destructive: false,
            poll_interval: Duration::from_secs(1),
            initial_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergeAction {
    Created,
    Updated,
    NoChanges,
}

/// Result of a successful convergence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    pub action: ConvergeAction,
    pub stack: StackDescriptor,
    /// Planned changes, when a change preview was used
    pub changes: Vec<ResourceChange>,
}

impl Convergence {
    pub fn outputs(&self) -> &BTreeMap<String, String> {
        &self.stack.outputs
    }
}

static NO_OP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)no updates are to be performed|didn'?t contain changes").unwrap()
});

/// Whether a control plane message means "the update is empty".
pub fn is_no_op_message(message: &str) -> bool {
    NO_OP_RE.is_match(message)
}

/// Failed resource events at or after `since`, newest first.
///
/// Cancellations caused by another resource failing go last; they name the
/// victim, not the cause.
pub fn failed_events(events: Vec<StackEvent>, since: DateTime<Utc>) -> Vec<StackEvent> {
    let mut failed: Vec<StackEvent> = events
        .into_iter()
        .filter(|event| event.timestamp >= since && event.resource_status.contains("FAILED"))
        .collect();
    failed.sort_by_key(|event| (is_cancellation(event), Reverse(event.timestamp)));
    failed
}

fn is_cancellation(event: &StackEvent) -> bool {
    event
        .resource_status_reason
        .as_deref()
        .map(|reason| reason.to_lowercase().contains("cancelled"))
        .unwrap_or(false)
}

/// Runs convergence against one control plane.
pub struct ConvergenceEngine<'a, C: ControlPlane + ?Sized> {
    control_plane: &'a C,
    sleeper: &'a dyn Sleeper,
    observer: &'a dyn PollObserver,
    options: ConvergeOptions,
}

impl<'a, C: ControlPlane + ?Sized> ConvergenceEngine<'a, C> {
    pub fn new(control_plane: &'a C, sleeper: &'a dyn Sleeper, options: ConvergeOptions) -> Self {
        Self {
            control_plane,
            sleeper,
            observer: &(),
            options,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn PollObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Create or update `stack_name` with `template_body` and wait for it.
    pub fn converge(&self, stack_name: &str, template_body: &str) -> Result<Convergence> {
        let existing = self.control_plane.describe_stack(stack_name)?;
        let mut request = StackRequest {
            stack_name: stack_name.to_string(),
            template_body: template_body.to_string(),
            tags: BTreeMap::from([(CREATED_BY_TAG.0.to_string(), CREATED_BY_TAG.1.to_string())]),
            stack_policy: None,
            on_failure: None,
        };

        match existing {
            None => {
                log::info!("Creating stack {}", stack_name);
                request.stack_policy = Some(safe_policy().to_string());
                request.on_failure = Some("DO_NOTHING".to_string());
                let started_at = Utc::now();
                self.control_plane.create_stack(&request)?;
                let stack = self.poll(stack_name, started_at)?;
                Ok(Convergence {
                    action: ConvergeAction::Created,
                    stack,
                    changes: Vec::new(),
                })
            }
            Some(current) => {
                log::info!("Updating stack {} ({})", stack_name, current.status);
                if !self.options.allow_destructive {
                    return self.update(&request, current);
                }

                let guard = PolicyGuard::lift(self.control_plane, stack_name)?;
                let result = self.update(&request, current);
                let restored = guard.restore();
                match (result, restored) {
                    (Ok(convergence), Ok(())) => Ok(convergence),
                    (Ok(_), Err(restore_error)) => Err(restore_error),
                    (Err(e), Ok(())) => Err(e),
                    (Err(e), Err(restore_error)) => {
                        log::warn!(
                            "Failed to restore stack policy of {}: {}",
                            stack_name,
                            restore_error
                        );
                        Err(e)
                    }
                }
            }
        }
    }

    fn update(&self, request: &StackRequest, current: StackDescriptor) -> Result<Convergence> {
        let started_at = Utc::now();
        let changes = if self.options.preview_changes {
            match self.preview_and_execute(request)? {
                Some(changes) => changes,
                None => return Ok(no_changes(current)),
            }
        } else {
            match self.control_plane.update_stack(request) {
                Ok(()) => Vec::new(),
                Err(Error::ControlPlane { ref message, .. }) if is_no_op_message(message) => {
                    return Ok(no_changes(current));
                }
                Err(e) => return Err(e),
            }
        };

        let stack = self.poll(&request.stack_name, started_at)?;
        Ok(Convergence {
            action: ConvergeAction::Updated,
            stack,
            changes,
        })
    }

    /// Returns `None` when the preview holds no changes.
    fn preview_and_execute(&self, request: &StackRequest) -> Result<Option<Vec<ResourceChange>>> {
        let stack_name = &request.stack_name;
        let change_set_name = format!("routestack-{}", Utc::now().timestamp_millis());

        match self.control_plane.create_change_set(request, &change_set_name) {
            Ok(()) => {}
            Err(Error::ControlPlane { ref message, .. }) if is_no_op_message(message) => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        let description = loop {
            let description = self
                .control_plane
                .describe_change_set(stack_name, &change_set_name)?;
            if !CHANGE_SET_PENDING.contains(&description.status.as_str()) {
                break description;
            }
            if !self.sleeper.sleep(self.options.poll_interval) {
                return Err(Error::Cancelled {
                    stack: stack_name.clone(),
                });
            }
        };

        if description.status == "FAILED" {
            let reason = description.status_reason.unwrap_or_default();
            if is_no_op_message(&reason) {
                return Ok(None);
            }
            return Err(Error::ChangeSetFailed {
                stack: stack_name.clone(),
                reason,
            });
        }

        for change in &description.changes {
            log::info!(
                "{} {} ({}){}",
                change.action,
                change.logical_resource_id,
                change.resource_type,
                change
                    .replacement
                    .as_deref()
                    .map(|r| format!(", replacement: {}", r))
                    .unwrap_or_default()
            );
        }

        self.control_plane
            .execute_change_set(stack_name, &change_set_name)?;
        Ok(Some(description.changes))
    }

    /// Poll until the stack reaches a terminal status.
    pub fn poll(&self, stack_name: &str, started_at: DateTime<Utc>) -> Result<StackDescriptor> {
        let cancelled = || Error::Cancelled {
            stack: stack_name.to_string(),
        };

        if !self.sleeper.sleep(self.options.initial_delay) {
            return Err(cancelled());
        }

        let mut last_reason: Option<String> = None;
        loop {
            let stack = self
                .control_plane
                .describe_stack(stack_name)?
                .ok_or_else(|| Error::StackNotFound {
                    stack: stack_name.to_string(),
                })?;
            let status: StackStatus = stack.status.parse()?;
            self.observer.on_status(stack_name, status.as_str());
            log::debug!("{}: {}", stack_name, status);

            if stack.status_reason.is_some() {
                last_reason = stack.status_reason.clone();
            }

            match status.action() {
                PollAction::Succeed => {
                    self.observer.on_finish(stack_name);
                    return Ok(stack);
                }
                PollAction::Error => {
                    self.observer.on_finish(stack_name);
                    let events = self.failure_events(stack_name, started_at)?;
                    let reason = events
                        .iter()
                        .find(|event| event.resource_type != NESTED_STACK_TYPE)
                        .or_else(|| events.first())
                        .and_then(|event| event.resource_status_reason.clone())
                        .or(last_reason)
                        .unwrap_or_else(|| "no reason reported".to_string());
                    return Err(Error::StackFailed {
                        stack: stack_name.to_string(),
                        status: status.to_string(),
                        reason,
                        events,
                    });
                }
                PollAction::Wait | PollAction::WaitOk | PollAction::WaitError => {
                    if !self.sleeper.sleep(self.options.poll_interval) {
                        self.observer.on_finish(stack_name);
                        return Err(cancelled());
                    }
                }
            }
        }
    }
}

const NESTED_STACK_TYPE: &str = "AWS::CloudFormation::Stack";

impl<'a, C: ControlPlane + ?Sized> ConvergenceEngine<'a, C> {
    /// Failed events of `stack_name` and of the nested stacks that failed
    /// with it. The inner stack's events carry the actual cause.
    fn failure_events(&self, stack_name: &str, since: DateTime<Utc>) -> Result<Vec<StackEvent>> {
        let own = failed_events(self.control_plane.describe_stack_events(stack_name)?, since);
        let nested: Vec<String> = own
            .iter()
            .filter(|event| event.resource_type == NESTED_STACK_TYPE)
            .filter_map(|event| event.physical_resource_id.clone())
            .filter(|id| id != stack_name)
            .collect();

        let mut events = own;
        for stack_id in nested {
            match self.control_plane.describe_stack_events(&stack_id) {
                Ok(inner) => events.extend(inner),
                Err(e) => log::debug!("No events for nested stack {}: {}", stack_id, e),
            }
        }
        Ok(failed_events(events, since))
    }
}

fn no_changes(current: StackDescriptor) -> Convergence {
    log::info!("No changes to deploy for {}", current.name);
    Convergence {
        action: ConvergeAction::NoChanges,
        stack: current,
        changes: Vec::new(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory control plane used by convergence and orchestrator tests.

    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use super::*;
    use crate::control_plane::ChangeSetDescription;

    #[derive(Default)]
    pub struct FakeControlPlane {
        /// Whether the stack exists; set by `create_stack`
        pub exists: Cell<bool>,
        /// Statuses returned by successive `describe_stack` calls; the last
        /// one repeats.
        pub statuses: RefCell<VecDeque<String>>,
        pub outputs: BTreeMap<String, String>,
        pub update_error: Option<String>,
        pub change_set: Option<ChangeSetDescription>,
        pub events: Vec<StackEvent>,
        /// Events of other stacks, keyed by stack name or id
        pub nested_events: BTreeMap<String, Vec<StackEvent>>,
        pub fail_policy_restore: bool,
        pub calls: RefCell<Vec<String>>,
        pub describe_calls: Cell<usize>,
        pub policies: RefCell<Vec<String>>,
    }

    impl FakeControlPlane {
        /// An existing stack reporting `statuses` in order.
        pub fn with_statuses(statuses: &[&str]) -> Self {
            let fake = Self::missing_then(statuses);
            fake.exists.set(true);
            fake
        }

        /// A missing stack that reports `statuses` once created.
        pub fn missing_then(statuses: &[&str]) -> Self {
            Self {
                statuses: RefCell::new(statuses.iter().map(|s| s.to_string()).collect()),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: &str) {
            self.calls.borrow_mut().push(call.to_string());
        }
    }

    impl ControlPlane for FakeControlPlane {
        fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescriptor>> {
            self.describe_calls.set(self.describe_calls.get() + 1);
            if !self.exists.get() {
                return Ok(None);
            }
            let mut statuses = self.statuses.borrow_mut();
            let status = match statuses.len() {
                0 => return Ok(None),
                1 => statuses[0].clone(),
                _ => statuses.pop_front().unwrap_or_default(),
            };
            Ok(Some(StackDescriptor {
                name: stack_name.to_string(),
                status,
                status_reason: None,
                outputs: self.outputs.clone(),
                mutation_locked: true,
            }))
        }

        fn create_stack(&self, request: &StackRequest) -> Result<()> {
            self.record("create_stack");
            assert_eq!(request.on_failure.as_deref(), Some("DO_NOTHING"));
            assert!(request.stack_policy.as_deref().unwrap_or("").contains("Deny"));
            self.exists.set(true);
            Ok(())
        }

        fn update_stack(&self, _request: &StackRequest) -> Result<()> {
            self.record("update_stack");
            match &self.update_error {
                Some(message) => Err(Error::control_plane("update-stack", message.clone())),
                None => Ok(()),
            }
        }

        fn create_change_set(&self, _request: &StackRequest, _name: &str) -> Result<()> {
            self.record("create_change_set");
            Ok(())
        }

        fn describe_change_set(&self, _stack: &str, _name: &str) -> Result<ChangeSetDescription> {
            self.record("describe_change_set");
            Ok(self.change_set.clone().unwrap_or(ChangeSetDescription {
                status: "CREATE_COMPLETE".to_string(),
                status_reason: None,
                changes: Vec::new(),
            }))
        }

        fn execute_change_set(&self, _stack: &str, _name: &str) -> Result<()> {
            self.record("execute_change_set");
            Ok(())
        }

        fn set_stack_policy(&self, _stack: &str, policy_body: &str) -> Result<()> {
            self.record("set_stack_policy");
            self.policies.borrow_mut().push(policy_body.to_string());
            let is_restore = policy_body.contains("Deny");
            if is_restore && self.fail_policy_restore {
                return Err(Error::control_plane("set-stack-policy", "access denied"));
            }
            Ok(())
        }

        fn describe_stack_events(&self, stack: &str) -> Result<Vec<StackEvent>> {
            self.record("describe_stack_events");
            match self.nested_events.get(stack) {
                Some(events) => Ok(events.clone()),
                None => Ok(self.events.clone()),
            }
        }
    }

    /// Sleeper that never blocks and counts its calls.
    #[derive(Default)]
    pub struct CountingSleeper {
        pub calls: Cell<usize>,
        pub cancel_after: Option<usize>,
    }

    impl Sleeper for CountingSleeper {
        fn sleep(&self, _duration: Duration) -> bool {
            self.calls.set(self.calls.get() + 1);
            match self.cancel_after {
                Some(limit) => self.calls.get() <= limit,
                None => true,
            }
        }
    }
}
