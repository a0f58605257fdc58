use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use tf_provider::Diagnostics;
use tokio_util::sync::CancellationToken;

use crate::api::{CoreApi, Lookup};
use crate::config::Config;

pub const GENERATED_NAME_PREFIX: &str = "tf";

const ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "eager", "fancy", "gentle", "happy", "jolly", "kind", "lively",
    "mellow", "nimble", "proud", "quiet", "rapid", "steady", "tidy", "vivid", "witty", "zesty",
];
const NOUNS: &[&str] = &[
    "badger", "beacon", "comet", "falcon", "harbor", "heron", "koala", "lynx", "meadow", "moose",
    "otter", "panda", "pebble", "raven", "river", "summit", "tiger", "walrus", "willow", "yak",
];

/// Random lowercase alphanumeric string
pub fn random_suffix(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

fn random_words() -> String {
    let mut rng = thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("quiet");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("otter");
    format!("{adjective}-{noun}")
}

/// Everything resources need once the provider is configured
pub struct Meta {
    pub client: Arc<dyn CoreApi>,
    pub organization: Lookup,
    pub data_center: Lookup,
    pub skip_trash_object_purge: bool,
    pub name_prefix: String,
    cancel: CancellationToken,
}

impl Debug for Meta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meta")
            .field("organization", &self.organization)
            .field("data_center", &self.data_center)
            .field("skip_trash_object_purge", &self.skip_trash_object_purge)
            .field("name_prefix", &self.name_prefix)
            .finish_non_exhaustive()
    }
}

impl Meta {
    pub fn new(client: Arc<dyn CoreApi>, config: &Config) -> Self {
        Self {
            client,
            organization: Lookup::organization(&config.organization),
            data_center: Lookup::data_center(&config.data_center),
            skip_trash_object_purge: config.skip_trash_object_purge,
            name_prefix: String::from(GENERATED_NAME_PREFIX),
            cancel: CancellationToken::new(),
        }
    }

    /// `name` if not empty, a random name otherwise
    pub fn use_or_generate_name(&self, name: &str) -> String {
        match (name.is_empty(), self.name_prefix.is_empty()) {
            (false, _) => name.to_owned(),
            (true, true) => String::new(),
            (true, false) => format!("{}-{}-{}", self.name_prefix, random_words(), random_suffix(4)),
        }
    }

    /// `hostname` if not empty, a random hostname otherwise
    pub fn use_or_generate_hostname(&self, hostname: &str) -> String {
        match (hostname.is_empty(), self.name_prefix.is_empty()) {
            (false, _) => hostname.to_owned(),
            (true, true) => String::new(),
            (true, false) => format!("{}-{}", self.name_prefix, random_words()),
        }
    }

    /// Use `cancel` as the root of every waiter token
    pub fn with_cancel(self, cancel: CancellationToken) -> Self {
        Self { cancel, ..self }
    }

    /// Token for the waiters of one operation
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }
}

/// Shared, late-initialized [`Meta`]
///
/// Resources are registered before the provider is configured, so they hold a
/// handle that is filled by `configure`.
#[derive(Clone, Default)]
pub struct MetaHandle(Arc<OnceLock<Arc<Meta>>>);

impl Debug for MetaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MetaHandle").field(&self.0.get()).finish()
    }
}

impl MetaHandle {
    /// Returns false if the handle was already set
    pub fn set(&self, meta: Meta) -> bool {
        self.0.set(Arc::new(meta)).is_ok()
    }

    pub fn get(&self, diags: &mut Diagnostics) -> Option<Arc<Meta>> {
        match self.0.get() {
            Some(meta) => Some(meta.clone()),
            None => {
                diags.root_error(
                    "Provider is not configured",
                    "The Katapult provider must be configured before resources can be used",
                );
                None
            }
        }
    }
}
