//! # MutationGateway
//! Coordinates one user-triggered write with its optimistic predictions and the eventual rollback.
//!
//! Everything up to and including dispatching the write happens synchronously inside
//! [`MutationGateway::submit`], so the prediction is on screen before the request leaves.
//! The returned [`Submission`] only has to be driven (spawned) to handle the result.
//! No failure escapes it.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use futures::FutureExt as _;
use futures::future::{self, LocalBoxFuture};

use crate::binding::Binding;
use crate::lifecycle::LifecycleGuard;
use crate::outcome::{Mutation, MutationError, MutationOutcome, RateLimitScope};
use crate::overlay::Confirmation;

pub trait Authenticator {
    fn is_authenticated(&self) -> bool;
    fn redirect_to_sign_in(&self);
}

/// The backing store's write endpoint. Writes are not assumed idempotent.
pub trait MutationEndpoint {
    fn invoke(&self, mutation: &Mutation) -> LocalBoxFuture<'static, MutationOutcome>;
}

/// Fire-and-forget, non-blocking notification surface (toasts).
pub trait Notifier {
    fn notify(&self, notice: Notice);
}

/// Runs `task` after `delay`. Used to re-check predictions once they may have gone stale.
pub trait Scheduler {
    fn after(&self, delay: Duration, task: Box<dyn FnOnce()>);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notice {
    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Error,
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Success,
        }
    }
}

/// Picks the words shown to the user for a finished write.
pub trait Copywriter {
    fn failure(&self, mutation: &Mutation, error: &MutationError) -> Notice;

    fn success(&self, _mutation: &Mutation) -> Option<Notice> {
        None
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCopy;

impl Copywriter for DefaultCopy {
    fn failure(&self, _mutation: &Mutation, error: &MutationError) -> Notice {
        match error {
            MutationError::RateLimited {
                scope: RateLimitScope::Cooldown,
            } => Notice::error(
                "Slow down",
                "You're doing that too quickly. Please wait a moment and try again.",
            ),
            MutationError::RateLimited {
                scope: RateLimitScope::HourlyCap,
            } => Notice::error(
                "Hourly limit reached",
                "You've hit the hourly limit for this action. Please try again later.",
            ),
            MutationError::VerificationRequired => Notice::error(
                "Verify your email",
                "Please verify your email address to continue.",
            ),
            MutationError::AuthRequired => {
                Notice::error("Sign in required", "Please sign in to continue.")
            }
            MutationError::TransientWriteFailure { .. } => {
                Notice::error("Error", "Something went wrong. Please try again.")
            }
        }
    }
}

/// How a submission ended, for callers that care. Nothing here needs handling.
#[derive(Clone, Debug, PartialEq)]
pub enum Settled {
    Confirmed(serde_json::Value),
    /// The write failed and every prediction was rolled back.
    RolledBack(MutationError),
    /// Not signed in: redirected, nothing was written.
    SignInRequired,
    /// Every staged binding was torn down before the write finished. Nothing was touched.
    Detached(MutationOutcome),
}

pub type Submission = LocalBoxFuture<'static, Settled>;

type Hook = Box<dyn FnOnce()>;

/// Collects what a submission has to undo or finish once the write resolves.
#[derive(Default)]
pub struct Staging {
    guards: Vec<LifecycleGuard>,
    rollbacks: Vec<Hook>,
    confirms: Vec<Hook>,
    timers: Vec<(Duration, Hook)>,
}

impl Staging {
    /// Apply a prediction to `binding` and arrange for it to be rolled back if the write fails.
    pub fn predict<V, C>(
        &mut self,
        binding: &Binding<V, C>,
        predict: impl FnOnce(&V) -> V,
    ) -> Option<V>
    where
        V: Clone + PartialEq + fmt::Debug + 'static,
        C: Confirmation<V> + 'static,
    {
        let predicted = binding.predict(predict)?;
        self.watch(binding.guard());

        let rollback = binding.clone();
        self.on_rollback(move || {
            rollback.roll_back();
        });

        // strictly after the threshold, so the check sees it as stale
        let expiry = binding.clone();
        self.after(
            binding.stale_after() + Duration::from_millis(1),
            move || expiry.refresh(),
        );
        Some(predicted)
    }

    /// The submission counts as detached only once every watched guard is down.
    pub fn watch(&mut self, guard: &LifecycleGuard) {
        self.guards.push(guard.clone());
    }

    pub fn on_rollback(&mut self, hook: impl FnOnce() + 'static) {
        self.rollbacks.push(Box::new(hook));
    }

    pub fn on_confirm(&mut self, hook: impl FnOnce() + 'static) {
        self.confirms.push(Box::new(hook));
    }

    pub fn after(&mut self, delay: Duration, task: impl FnOnce() + 'static) {
        self.timers.push((delay, Box::new(task)));
    }

    fn is_live(&self) -> bool {
        self.guards.is_empty() || self.guards.iter().any(LifecycleGuard::is_live)
    }

    fn roll_back(self) {
        for hook in self.rollbacks {
            hook();
        }
    }

    fn confirm(self) {
        for hook in self.confirms {
            hook();
        }
    }
}

pub struct MutationGateway {
    auth: Rc<dyn Authenticator>,
    endpoint: Rc<dyn MutationEndpoint>,
    notifier: Rc<dyn Notifier>,
    copy: Rc<dyn Copywriter>,
    scheduler: Option<Rc<dyn Scheduler>>,
    announce_success: bool,
}

impl MutationGateway {
    pub fn new(
        auth: Rc<dyn Authenticator>,
        endpoint: Rc<dyn MutationEndpoint>,
        notifier: Rc<dyn Notifier>,
    ) -> Self {
        Self {
            auth,
            endpoint,
            notifier,
            copy: Rc::new(DefaultCopy),
            scheduler: None,
            announce_success: false,
        }
    }

    pub fn with_copy(mut self, copy: Rc<dyn Copywriter>) -> Self {
        self.copy = copy;
        self
    }

    /// Without a scheduler, stale predictions are only retired when something reads the binding.
    pub fn with_scheduler(mut self, scheduler: Rc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn announce_success(mut self, announce_success: bool) -> Self {
        self.announce_success = announce_success;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    /// Stage predictions with `stage`, then dispatch `mutation`.
    ///
    /// A second submission for the same binding before the first resolves is fine: it predicts from
    /// whatever is displayed, including the first prediction. There is no queueing.
    pub fn submit(&self, mutation: Mutation, stage: impl FnOnce(&mut Staging)) -> Submission {
        if !self.auth.is_authenticated() {
            log::info!("Not signed in, redirecting instead of running {mutation}");
            self.auth.redirect_to_sign_in();
            return future::ready(Settled::SignInRequired).boxed_local();
        }

        let mut staging = Staging::default();
        stage(&mut staging);

        let timers = std::mem::take(&mut staging.timers);
        if let Some(scheduler) = &self.scheduler {
            for (delay, task) in timers {
                scheduler.after(delay, task);
            }
        }

        log::debug!("Dispatching {mutation}");
        let pending = self.endpoint.invoke(&mutation);

        let auth = Rc::clone(&self.auth);
        let notifier = Rc::clone(&self.notifier);
        let copy = Rc::clone(&self.copy);
        let announce_success = self.announce_success;

        async move {
            let outcome = pending.await;

            if !staging.is_live() {
                log::debug!("{mutation} finished after its bindings were torn down");
                if let MutationOutcome::Failed(error) = &outcome
                    && !matches!(error, MutationError::AuthRequired)
                {
                    notifier.notify(copy.failure(&mutation, error));
                }
                return Settled::Detached(outcome);
            }

            match outcome {
                MutationOutcome::Confirmed(value) => {
                    staging.confirm();
                    if announce_success && let Some(notice) = copy.success(&mutation) {
                        notifier.notify(notice);
                    }
                    Settled::Confirmed(value)
                }
                MutationOutcome::Failed(error) => {
                    // revert first, so the UI is already back to its old state when the notice shows
                    staging.roll_back();
                    match &error {
                        MutationError::AuthRequired => {
                            log::info!("{mutation} rejected: session expired");
                            auth.redirect_to_sign_in();
                        }
                        _ => {
                            log::warn!("{mutation} failed: {error}");
                            notifier.notify(copy.failure(&mutation, &error));
                        }
                    }
                    Settled::RolledBack(error)
                }
            }
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingConfig;
    use crate::clock::ManualClock;
    use crate::overlay::{Exact, Tally};
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use std::cell::{Cell, RefCell};

    struct SignedIn(bool, Rc<Cell<usize>>);

    impl Authenticator for SignedIn {
        fn is_authenticated(&self) -> bool {
            self.0
        }

        fn redirect_to_sign_in(&self) {
            self.1.set(self.1.get() + 1);
        }
    }

    #[derive(Default)]
    struct Scripted {
        calls: RefCell<Vec<String>>,
        replies: RefCell<Vec<oneshot::Sender<MutationOutcome>>>,
    }

    impl MutationEndpoint for Scripted {
        fn invoke(&self, mutation: &Mutation) -> LocalBoxFuture<'static, MutationOutcome> {
            self.calls.borrow_mut().push(mutation.name.clone());
            let (tx, rx) = oneshot::channel();
            self.replies.borrow_mut().push(tx);
            async move {
                rx.await
                    .unwrap_or_else(|_| MutationOutcome::Failed(MutationError::transient("dropped")))
            }
            .boxed_local()
        }
    }

    #[derive(Default)]
    struct Toasts(RefCell<Vec<Notice>>);

    impl Notifier for Toasts {
        fn notify(&self, notice: Notice) {
            self.0.borrow_mut().push(notice);
        }
    }

    fn gateway(
        signed_in: bool,
    ) -> (MutationGateway, Rc<Scripted>, Rc<Toasts>, Rc<Cell<usize>>) {
        let redirects = Rc::new(Cell::new(0));
        let endpoint = Rc::new(Scripted::default());
        let toasts = Rc::new(Toasts::default());
        let gateway = MutationGateway::new(
            Rc::new(SignedIn(signed_in, Rc::clone(&redirects))),
            endpoint.clone(),
            toasts.clone(),
        );
        (gateway, endpoint, toasts, redirects)
    }

    fn reply(endpoint: &Scripted, index: usize, outcome: MutationOutcome) {
        let tx = endpoint.replies.borrow_mut().remove(index);
        tx.send(outcome).unwrap();
    }

    #[test]
    fn test_signed_out_redirects_without_writing() {
        let (gateway, endpoint, toasts, redirects) = gateway(false);
        let liked = Binding::new(
            false,
            Exact,
            BindingConfig::default(),
            Rc::new(ManualClock::new()),
        );

        let submission = gateway.submit(Mutation::new("likes:toggle", serde_json::json!({})), |s| {
            s.predict(&liked, |v| !v);
        });

        assert_eq!(block_on(submission), Settled::SignInRequired);
        assert_eq!(redirects.get(), 1);
        assert!(endpoint.calls.borrow().is_empty());
        assert!(toasts.0.borrow().is_empty());
        assert!(!liked.displayed());
    }

    #[test]
    fn test_rate_limit_rolls_back_with_specific_copy() {
        let (gateway, endpoint, toasts, _) = gateway(true);
        let likes = Binding::new(
            3u64,
            Tally,
            BindingConfig::default(),
            Rc::new(ManualClock::new()),
        );

        let submission = gateway.submit(Mutation::new("likes:toggle", serde_json::json!({})), |s| {
            s.predict(&likes, |n| n + 1);
        });
        assert_eq!(likes.displayed(), 4);

        reply(
            &endpoint,
            0,
            MutationOutcome::Failed(MutationError::rate_limited(RateLimitScope::Cooldown)),
        );
        let settled = block_on(submission);

        assert_eq!(
            settled,
            Settled::RolledBack(MutationError::rate_limited(RateLimitScope::Cooldown))
        );
        assert_eq!(likes.displayed(), 3);
        assert_eq!(toasts.0.borrow().len(), 1);
        assert_eq!(toasts.0.borrow()[0].title, "Slow down");
    }

    #[test]
    fn test_expired_session_redirects_instead_of_toasting() {
        let (gateway, endpoint, toasts, redirects) = gateway(true);
        let liked = Binding::new(
            false,
            Exact,
            BindingConfig::default(),
            Rc::new(ManualClock::new()),
        );

        let submission = gateway.submit(Mutation::new("likes:toggle", serde_json::json!({})), |s| {
            s.predict(&liked, |v| !v);
        });
        reply(&endpoint, 0, MutationOutcome::Failed(MutationError::AuthRequired));

        assert_eq!(
            block_on(submission),
            Settled::RolledBack(MutationError::AuthRequired)
        );
        assert_eq!(redirects.get(), 1);
        assert!(toasts.0.borrow().is_empty());
        assert!(!liked.displayed());
    }

    #[test]
    fn test_scheduler_gets_one_timer_per_prediction() {
        #[derive(Default)]
        struct Timers(RefCell<Vec<(Duration, Box<dyn FnOnce()>)>>);
        impl Scheduler for Timers {
            fn after(&self, delay: Duration, task: Box<dyn FnOnce()>) {
                self.0.borrow_mut().push((delay, task));
            }
        }

        let (gateway, _endpoint, _toasts, _) = gateway(true);
        let timers = Rc::new(Timers::default());
        let gateway = gateway.with_scheduler(timers.clone());
        let clock = ManualClock::new();
        let likes = Binding::new(
            3u64,
            Tally,
            BindingConfig::stale_after_ms(5_000),
            Rc::new(clock.clone()),
        );
        likes.push(3);

        let _submission = gateway.submit(Mutation::new("likes:toggle", serde_json::json!({})), |s| {
            s.predict(&likes, |n| n + 1);
        });

        let (delay, task) = timers.0.borrow_mut().remove(0);
        assert_eq!(delay, Duration::from_millis(5_001));

        clock.advance(delay);
        task();
        assert!(!likes.has_overlay());
        assert_eq!(likes.displayed(), 3);
    }
}
