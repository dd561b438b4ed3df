//! Test deriving for configs with nested serde types and enums.

use std::collections::BTreeMap;

use cfgsync::{ConfigType, ConfigValue};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct Shard {
    host: String,
    port: u16,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Mode {
    Fast,
    Exact,
}

#[derive(ConfigType, Serialize, Deserialize)]
struct IndexConfig {
    shards: Vec<Shard>,
    mode: Mode,
    #[serde(default)]
    tuning: BTreeMap<String, f64>,
}

#[derive(ConfigType, Serialize, Deserialize)]
enum Toggle {
    On,
    Off,
}

fn main() {
    let value = ConfigValue::new(r#"{"shards":[{"host":"a","port":1}],"mode":"fast"}"#);
    let config = IndexConfig::decode(&value).unwrap();
    assert_eq!(config.shards.len(), 1);
    assert!(matches!(config.mode, Mode::Fast));
    assert!(config.tuning.is_empty());

    assert_eq!(Toggle::DEF_NAME, "toggle");
}
