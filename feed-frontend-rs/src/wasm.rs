//! What the React side sees.

use std::rc::Rc;
use std::sync::LazyLock;

use hunch::{ListWindow, Notice, Notifier, Submission};
use wasm_bindgen::prelude::*;

use crate::FeedApp;
use crate::auth::Session;
use crate::comments::{Comment, CommentDrawer};
use crate::config::FeedConfig;
use crate::engagement::{EngagementSnapshot, Interaction, ToggleButton};
use crate::utils::{self, PerformanceClock, TimeoutScheduler};

// putting this inside LOGGER prevents us from accidentally initializing the logger more than once
static LOGGER: LazyLock<()> = LazyLock::new(|| {
    utils::set_panic_hook();

    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Logging initialized");
});

struct JsNotifier(js_sys::Function);

impl Notifier for JsNotifier {
    fn notify(&self, notice: Notice) {
        match serde_wasm_bindgen::to_value(&notice) {
            Ok(notice) => {
                if let Err(e) = self.0.call1(&JsValue::NULL, &notice) {
                    log::error!("Notice callback threw: {e:?}");
                }
            }
            Err(e) => log::error!("Error serializing notice: {e}"),
        }
    }
}

fn call_with<T: serde::Serialize>(callback: &js_sys::Function, value: &T) {
    match serde_wasm_bindgen::to_value(value) {
        Ok(value) => {
            if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                log::error!("Render callback threw: {e:?}");
            }
        }
        Err(e) => log::error!("Error serializing callback argument: {e}"),
    }
}

/// Nothing has to wait for a submission; it cleans up after itself.
fn drive(submission: Submission) {
    wasm_bindgen_futures::spawn_local(async move {
        let settled = submission.await;
        log::debug!("Submission settled: {settled:?}");
    });
}

#[wasm_bindgen]
pub struct FeedClient {
    app: FeedApp,
}

#[wasm_bindgen]
impl FeedClient {
    /// `config` may be `undefined`, or any subset of `FeedConfig`'s fields.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config: JsValue,
        access_token: Option<String>,
        on_notice: js_sys::Function,
        on_sign_in: js_sys::Function,
    ) -> Result<FeedClient, JsValue> {
        LazyLock::force(&LOGGER);

        let config: FeedConfig = if config.is_undefined() || config.is_null() {
            FeedConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        let session = Rc::new(Session::new(access_token, move || {
            if let Err(e) = on_sign_in.call0(&JsValue::NULL) {
                log::error!("Sign-in redirect threw: {e:?}");
            }
        }));
        let endpoint = FeedApp::convex_endpoint(&config, &session);

        Ok(FeedClient {
            app: FeedApp::new(
                config,
                Rc::new(PerformanceClock::new()),
                session,
                Rc::new(endpoint),
                Rc::new(JsNotifier(on_notice)),
                Some(Rc::new(TimeoutScheduler) as Rc<dyn hunch::Scheduler>),
            ),
        })
    }

    pub fn set_access_token(&self, access_token: Option<String>) {
        self.app.session().set_access_token(access_token);
    }

    /// `interaction` is `"like"`, `"retweet"` or `"follow"`.
    pub fn toggle_button(
        &self,
        interaction: &str,
        target_id: String,
        active: bool,
        count: u32,
    ) -> Result<JsToggleButton, JsValue> {
        let interaction: Interaction = interaction
            .parse()
            .map_err(|e: crate::engagement::UnknownInteraction| JsValue::from_str(&e.to_string()))?;
        Ok(JsToggleButton {
            button: self.app.toggle_button(
                interaction,
                target_id,
                EngagementSnapshot {
                    active,
                    count: u64::from(count),
                },
            ),
        })
    }

    pub fn comment_drawer(
        &self,
        entry_id: String,
        comments: JsValue,
        has_more: bool,
        count: u32,
    ) -> Result<JsCommentDrawer, JsValue> {
        let items: Vec<Comment> = serde_wasm_bindgen::from_value(comments)?;
        Ok(JsCommentDrawer {
            drawer: self.app.comment_drawer(
                entry_id,
                ListWindow { items, has_more },
                u64::from(count),
            ),
        })
    }
}

#[wasm_bindgen]
pub struct JsToggleButton {
    button: ToggleButton,
}

#[wasm_bindgen]
impl JsToggleButton {
    #[wasm_bindgen(getter)]
    pub fn active(&self) -> bool {
        self.button.active()
    }

    #[wasm_bindgen(getter)]
    pub fn count(&self) -> f64 {
        self.button.count() as f64
    }

    pub fn toggle(&self) {
        drive(self.button.toggle());
    }

    pub fn push(&self, active: bool, count: u32) {
        self.button.push(EngagementSnapshot {
            active,
            count: u64::from(count),
        });
    }

    /// `callback` gets `{ active, count }` whenever either changes.
    pub fn on_change(&self, callback: js_sys::Function) {
        self.button
            .on_change(move |snapshot| call_with(&callback, &snapshot));
    }
}

impl Drop for JsToggleButton {
    fn drop(&mut self) {
        self.button.teardown();
    }
}

#[wasm_bindgen]
pub struct JsCommentDrawer {
    drawer: CommentDrawer,
}

#[wasm_bindgen]
impl JsCommentDrawer {
    pub fn rows(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.drawer.rows())?)
    }

    #[wasm_bindgen(getter)]
    pub fn count(&self) -> f64 {
        self.drawer.count() as f64
    }

    #[wasm_bindgen(getter)]
    pub fn has_more(&self) -> bool {
        self.drawer.has_more()
    }

    /// Fails without posting if the text is empty or too long.
    pub fn post(&self, author_id: &str, author_name: &str, text: &str) -> Result<(), JsValue> {
        let submission = self
            .drawer
            .post(author_id, author_name, text)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        drive(submission);
        Ok(())
    }

    pub fn push_window(&self, comments: JsValue, has_more: bool) -> Result<(), JsValue> {
        let items: Vec<Comment> = serde_wasm_bindgen::from_value(comments)?;
        self.drawer.push_window(ListWindow { items, has_more });
        Ok(())
    }

    pub fn push_count(&self, count: u32) {
        self.drawer.push_count(u64::from(count));
    }

    pub fn on_rows(&self, callback: js_sys::Function) {
        self.drawer.on_rows(move |rows| call_with(&callback, &rows));
    }

    pub fn on_count(&self, callback: js_sys::Function) {
        self.drawer.on_count(move |count| call_with(&callback, &count));
    }
}

impl Drop for JsCommentDrawer {
    fn drop(&mut self) {
        self.drawer.teardown();
    }
}
