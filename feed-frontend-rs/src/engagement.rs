//! Like, retweet and follow buttons. Each one shows a flag ("have I liked this?") and a count,
//! both of which move the moment the button is pressed.

use std::cell::RefCell;
use std::rc::Rc;

use hunch::{
    Binding, BindingConfig, Clock, Exact, ListenerKey, Mutation, MutationGateway, Submission,
    Subscription, SubscriptionKey, SubscriptionTransport, Tally,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    Like,
    Retweet,
    Follow,
}

impl Interaction {
    pub fn mutation_name(self) -> &'static str {
        match self {
            Interaction::Like => "likes:toggle",
            Interaction::Retweet => "retweets:toggle",
            Interaction::Follow => "follows:toggle",
        }
    }

    pub fn from_mutation_name(name: &str) -> Option<Self> {
        [Interaction::Like, Interaction::Retweet, Interaction::Follow]
            .into_iter()
            .find(|interaction| interaction.mutation_name() == name)
    }

    /// The metric name used for subscriptions, e.g. `entry-1/likes`.
    pub fn metric(self) -> &'static str {
        match self {
            Interaction::Like => "likes",
            Interaction::Retweet => "retweets",
            Interaction::Follow => "followers",
        }
    }

    fn target_arg(self) -> &'static str {
        match self {
            Interaction::Like | Interaction::Retweet => "entryId",
            Interaction::Follow => "userId",
        }
    }
}

impl std::str::FromStr for Interaction {
    type Err = UnknownInteraction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Interaction::Like),
            "retweet" => Ok(Interaction::Retweet),
            "follow" => Ok(Interaction::Follow),
            _ => Err(UnknownInteraction(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown interaction: {0}")]
pub struct UnknownInteraction(String);

/// What the server says about one button: whether the current user is active, and the total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
pub struct EngagementSnapshot {
    pub active: bool,
    pub count: u64,
}

#[derive(Clone)]
pub struct ToggleButton {
    interaction: Interaction,
    target_id: String,
    active: Binding<bool, Exact>,
    count: Binding<u64, Tally>,
    gateway: Rc<MutationGateway>,
    subscription: Rc<RefCell<Option<Subscription>>>,
}

impl ToggleButton {
    pub fn new(
        interaction: Interaction,
        target_id: impl Into<String>,
        seed: EngagementSnapshot,
        config: BindingConfig,
        clock: Rc<dyn Clock>,
        gateway: Rc<MutationGateway>,
    ) -> Self {
        Self {
            interaction,
            target_id: target_id.into(),
            active: Binding::new(seed.active, Exact, config, Rc::clone(&clock)),
            count: Binding::new(seed.count, Tally, config, clock),
            gateway,
            subscription: Rc::new(RefCell::new(None)),
        }
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn active(&self) -> bool {
        self.active.displayed()
    }

    pub fn count(&self) -> u64 {
        self.count.displayed()
    }

    pub fn snapshot(&self) -> EngagementSnapshot {
        EngagementSnapshot {
            active: self.active(),
            count: self.count(),
        }
    }

    pub fn push(&self, snapshot: EngagementSnapshot) {
        self.active.push(snapshot.active);
        self.count.push(snapshot.count);
    }

    pub fn subscription_key(&self) -> SubscriptionKey {
        SubscriptionKey::new(&self.target_id, self.interaction.metric())
    }

    /// Follow server snapshots for this button until it is torn down.
    pub fn subscribe_to<T>(&self, transport: &T)
    where
        T: SubscriptionTransport<EngagementSnapshot> + ?Sized,
    {
        if !self.active.is_live() {
            return;
        }
        let active = self.active.clone();
        let count = self.count.clone();
        let subscription = transport.subscribe(
            &self.subscription_key(),
            Rc::new(move |snapshot: EngagementSnapshot| {
                active.push(snapshot.active);
                count.push(snapshot.count);
            }),
        );
        let previous = self.subscription.replace(Some(subscription));
        drop(previous);
    }

    /// Called with the whole snapshot whenever either half of it changes on screen.
    pub fn on_change(&self, listener: impl Fn(EngagementSnapshot) + 'static) -> [ListenerKey; 2] {
        let listener = Rc::new(listener);

        let count = self.count.clone();
        let on_active = Rc::clone(&listener);
        let active_key = self.active.subscribe(move |active| {
            on_active(EngagementSnapshot {
                active: *active,
                count: count.displayed(),
            })
        });

        let active = self.active.clone();
        let count_key = self.count.subscribe(move |count| {
            listener(EngagementSnapshot {
                active: active.displayed(),
                count: *count,
            })
        });

        [active_key, count_key]
    }

    pub fn off_change(&self, [active_key, count_key]: [ListenerKey; 2]) {
        self.active.unsubscribe(active_key);
        self.count.unsubscribe(count_key);
    }

    /// Flip the button. The flag and the count move immediately, built on what is currently shown,
    /// so a second press before the first write resolves undoes the first.
    pub fn toggle(&self) -> Submission {
        let was_active = self.active.displayed();
        let mut args = serde_json::Map::new();
        args.insert(
            self.interaction.target_arg().to_string(),
            serde_json::Value::String(self.target_id.clone()),
        );
        let mutation = Mutation::new(self.interaction.mutation_name(), args.into());

        self.gateway.submit(mutation, |stage| {
            stage.predict(&self.active, |active| !active);
            stage.predict(&self.count, |count| {
                if was_active {
                    count.saturating_sub(1)
                } else {
                    count + 1
                }
            });
        })
    }

    pub fn teardown(&self) {
        let subscription = self.subscription.take();
        drop(subscription);
        self.active.teardown();
        self.count.teardown();
    }

    pub fn is_live(&self) -> bool {
        self.active.is_live() || self.count.is_live()
    }
}

impl std::fmt::Debug for ToggleButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToggleButton")
            .field("interaction", &self.interaction)
            .field("target_id", &self.target_id)
            .field("active", &self.active)
            .field("count", &self.count)
            .finish()
    }
}
