//! Configuration handed to the automation agent.

mod profiles;

pub use profiles::{
    AgentProfileConfig, AgentSection, LlmProfile, ProfileError, CONFIG_FILE, DEFAULT_MODEL,
    DEFAULT_PROVIDER, PROFILE_ROLES,
};
