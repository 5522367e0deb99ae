pub fn set_panic_hook() {
    // When the `console_error_panic_hook` feature is enabled, we can call the
    // `set_panic_hook` function at least once during initialization, and then
    // we will get better error messages if our code ever panics.
    //
    // For more details see
    // https://github.com/rustwasm/console_error_panic_hook#readme
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

#[cfg(target_arch = "wasm32")]
pub use browser::{PerformanceClock, TimeoutScheduler};

#[cfg(target_arch = "wasm32")]
mod browser {
    use std::time::Duration;

    use hunch::{Clock, Scheduler, Timestamp};
    use wasm_bindgen::JsCast as _;
    use wasm_bindgen::closure::Closure;

    /// `performance.now()`, falling back to `Date.now()` where there is no `window` (workers).
    pub struct PerformanceClock {
        performance: Option<web_sys::Performance>,
    }

    impl PerformanceClock {
        pub fn new() -> Self {
            Self {
                performance: web_sys::window().and_then(|window| window.performance()),
            }
        }
    }

    impl Default for PerformanceClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for PerformanceClock {
        fn now(&self) -> Timestamp {
            let millis = match &self.performance {
                Some(performance) => performance.now(),
                None => js_sys::Date::now(),
            };
            Timestamp::from_millis(millis as u64)
        }
    }

    /// `setTimeout`.
    #[derive(Default)]
    pub struct TimeoutScheduler;

    impl Scheduler for TimeoutScheduler {
        fn after(&self, delay: Duration, task: Box<dyn FnOnce()>) {
            let Some(window) = web_sys::window() else {
                log::warn!("No window to schedule a timer on");
                return;
            };
            let callback = Closure::once_into_js(move || task());
            let delay = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
            if let Err(e) = window
                .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
            {
                log::error!("Failed to set timeout: {e:?}");
            }
        }
    }
}
