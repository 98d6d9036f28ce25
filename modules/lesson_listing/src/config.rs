use chrono_tz::Tz;
use keyset_core::{LimitCfg, LimitPolicy};
use serde::{Deserialize, Serialize};

/// Configuration for the lesson_listing module (`modules.lesson_listing`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListingConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    #[serde(default)]
    pub limit_policy: LimitPolicy,
    /// Zone used to turn instants into calendar dates.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    /// Table-valued function expanding recurring packages (PostgreSQL only).
    #[serde(default = "default_recurring_slot_function")]
    pub recurring_slot_function: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            limit_policy: LimitPolicy::default(),
            timezone: default_timezone(),
            recurring_slot_function: default_recurring_slot_function(),
        }
    }
}

impl ListingConfig {
    pub fn limits(&self) -> LimitCfg {
        LimitCfg {
            default: self.default_page_size,
            max: self.max_page_size,
            policy: self.limit_policy,
        }
    }
}

fn default_page_size() -> u32 {
    25
}

fn default_max_page_size() -> u32 {
    1000
}

fn default_timezone() -> Tz {
    chrono_tz::Asia::Ho_Chi_Minh
}

fn default_recurring_slot_function() -> String {
    "recurring_slot_occurrences".to_string()
}
