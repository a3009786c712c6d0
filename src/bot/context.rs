use std::sync::Arc;

use super::roles::LEVEL_MEMBER;
use crate::config::ChannelSettings;

/// Everything known about one invocation: who, where, and the channel's
/// resolved settings. Built once per message and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Context {
    pub bot_id: String,
    pub platform: String,
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub is_direct: bool,
    pub user_level: u8,
    /// The invoker's linked card in this channel when the context was built.
    pub linked_card: Option<String>,
    pub config: Arc<ChannelSettings>,
}

impl Context {
    /// A member in a group channel with default settings; the user name is the id.
    pub fn new(channel_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            bot_id: "rolldeck".to_string(),
            platform: "cli".to_string(),
            guild_id: None,
            channel_id: channel_id.into(),
            user_name: user_id.clone(),
            user_id,
            is_direct: false,
            user_level: LEVEL_MEMBER,
            linked_card: None,
            config: Arc::new(ChannelSettings::default()),
        }
    }

    pub fn with_config(mut self, config: ChannelSettings) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = name.into();
        self
    }

    pub fn with_linked_card(mut self, name: Option<String>) -> Self {
        self.linked_card = name;
        self
    }
}

/// A chat message as handed over by a platform adapter.
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    pub is_direct: bool,
    /// Level granted by the platform (e.g. server admin); combined with configured owners.
    pub platform_level: Option<u8>,
}

impl IncomingMessage {
    pub fn new(channel_id: impl Into<String>, user_id: impl Into<String>, text: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            channel_id: channel_id.into(),
            user_name: user_id.clone(),
            user_id,
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn direct(mut self) -> Self {
        self.is_direct = true;
        self
    }

    pub fn from_user(mut self, name: impl Into<String>) -> Self {
        self.user_name = name.into();
        self
    }
}
