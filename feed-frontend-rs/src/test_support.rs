use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use futures::FutureExt as _;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use hunch::{
    Clock, ManualClock, Mutation, MutationEndpoint, MutationError, MutationGateway,
    MutationOutcome, Notice, Notifier, Scheduler,
};

use crate::FeedApp;
use crate::auth::Session;
use crate::config::FeedConfig;
use crate::notifications::FeedCopy;

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Records writes; each one stays in flight until the test resolves it.
#[derive(Default)]
pub(crate) struct ScriptedEndpoint {
    pub(crate) writes: RefCell<Vec<Mutation>>,
    replies: RefCell<Vec<Option<oneshot::Sender<MutationOutcome>>>>,
}

impl ScriptedEndpoint {
    pub(crate) fn resolve(&self, index: usize, outcome: MutationOutcome) {
        let tx = self.replies.borrow_mut()[index]
            .take()
            .expect("write already resolved");
        tx.send(outcome).expect("submission dropped");
    }
}

impl MutationEndpoint for ScriptedEndpoint {
    fn invoke(&self, mutation: &Mutation) -> LocalBoxFuture<'static, MutationOutcome> {
        self.writes.borrow_mut().push(mutation.clone());
        let (tx, rx) = oneshot::channel();
        self.replies.borrow_mut().push(Some(tx));
        async move {
            rx.await.unwrap_or_else(|_| {
                MutationOutcome::Failed(MutationError::transient("reply dropped"))
            })
        }
        .boxed_local()
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) notices: RefCell<Vec<Notice>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.borrow_mut().push(notice);
    }
}

/// Keeps the delays it was asked for and never runs anything.
#[derive(Default)]
pub(crate) struct RecordingScheduler {
    pub(crate) delays: RefCell<Vec<Duration>>,
}

impl Scheduler for RecordingScheduler {
    fn after(&self, delay: Duration, _task: Box<dyn FnOnce()>) {
        self.delays.borrow_mut().push(delay);
    }
}

pub(crate) struct TestBackend {
    pub(crate) clock: ManualClock,
    pub(crate) endpoint: Rc<ScriptedEndpoint>,
    pub(crate) notifier: Rc<RecordingNotifier>,
    pub(crate) scheduler: Rc<RecordingScheduler>,
    pub(crate) redirects: Rc<Cell<usize>>,
    pub(crate) session: Rc<Session>,
    gateway: Rc<MutationGateway>,
}

impl TestBackend {
    pub(crate) fn signed_in() -> Self {
        Self::with_token(Some("token".to_string()))
    }

    pub(crate) fn signed_out() -> Self {
        Self::with_token(None)
    }

    fn with_token(access_token: Option<String>) -> Self {
        init_logging();
        let redirects = Rc::new(Cell::new(0));
        let session = {
            let redirects = Rc::clone(&redirects);
            Rc::new(Session::new(access_token, move || {
                redirects.set(redirects.get() + 1)
            }))
        };
        let endpoint = Rc::new(ScriptedEndpoint::default());
        let notifier = Rc::new(RecordingNotifier::default());
        let scheduler = Rc::new(RecordingScheduler::default());
        let gateway = MutationGateway::new(session.clone(), endpoint.clone(), notifier.clone())
            .with_copy(Rc::new(FeedCopy))
            .with_scheduler(scheduler.clone());

        Self {
            clock: ManualClock::new(),
            endpoint,
            notifier,
            scheduler,
            redirects,
            session,
            gateway: Rc::new(gateway),
        }
    }

    pub(crate) fn clock(&self) -> Rc<dyn Clock> {
        Rc::new(self.clock.clone())
    }

    pub(crate) fn gateway(&self) -> Rc<MutationGateway> {
        Rc::clone(&self.gateway)
    }

    /// An app wired to this backend, with its own gateway built from `config`.
    pub(crate) fn app(&self, config: FeedConfig) -> FeedApp {
        FeedApp::new(
            config,
            self.clock(),
            Rc::clone(&self.session),
            self.endpoint.clone(),
            self.notifier.clone(),
            Some(self.scheduler.clone() as Rc<dyn Scheduler>),
        )
    }
}
