//! Test that the definition name defaults to the snake_case type name.

use cfgsync::{ConfigKey, ConfigType};
use serde::{Deserialize, Serialize};

#[derive(ConfigType, Serialize, Deserialize)]
struct SearchConfig {
    threads: u32,
}

fn main() {
    assert_eq!(SearchConfig::DEF_NAME, "search_config");
    assert_eq!(SearchConfig::DEF_NAMESPACE, "config");

    let key = ConfigKey::of::<SearchConfig>("search/0");
    assert_eq!(key.to_string(), "config.search_config,search/0");
}
