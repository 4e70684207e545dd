use serde::{Deserialize, Serialize};

/// Configuration for the users_info module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsersInfoConfig {
    /// Start with the three demo users (ids 1..=3).
    #[serde(default = "default_seed_demo_users")]
    pub seed_demo_users: bool,
    #[serde(default = "default_min_name_length")]
    pub min_name_length: usize,
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

impl Default for UsersInfoConfig {
    fn default() -> Self {
        Self {
            seed_demo_users: default_seed_demo_users(),
            min_name_length: default_min_name_length(),
            max_name_length: default_max_name_length(),
        }
    }
}

impl UsersInfoConfig {
    pub fn name_rules(&self) -> NameRules {
        NameRules {
            min: self.min_name_length,
            max: self.max_name_length,
        }
    }
}

/// Length bounds for user names, counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameRules {
    pub min: usize,
    pub max: usize,
}

impl Default for NameRules {
    fn default() -> Self {
        UsersInfoConfig::default().name_rules()
    }
}

impl NameRules {
    /// The violation message when `name` is blank or outside the bounds.
    pub fn check(&self, name: &str) -> Option<String> {
        let len = name.chars().count();
        if name.trim().is_empty() || len < self.min || len > self.max {
            return Some(format!(
                "Name must be between {} and {} characters.",
                self.min, self.max
            ));
        }
        None
    }
}

fn default_seed_demo_users() -> bool {
    true
}

fn default_min_name_length() -> usize {
    2
}

fn default_max_name_length() -> usize {
    100
}
