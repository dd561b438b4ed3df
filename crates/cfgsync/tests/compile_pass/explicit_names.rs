//! Test that `#[config(...)]` overrides the definition name and namespace.

use cfgsync::ConfigType;
use serde::{Deserialize, Serialize};

#[derive(ConfigType, Serialize, Deserialize)]
#[config(name = "ranking", namespace = "search.rank")]
struct RankingProfile {
    profile: String,
}

#[derive(ConfigType, Serialize, Deserialize)]
#[config(namespace = "vespa")]
struct Qr;

fn main() {
    assert_eq!(RankingProfile::DEF_NAME, "ranking");
    assert_eq!(RankingProfile::DEF_NAMESPACE, "search.rank");
    assert_eq!(Qr::DEF_NAME, "qr");
    assert_eq!(Qr::DEF_NAMESPACE, "vespa");

    let value = RankingProfile {
        profile: "default".to_string(),
    }
    .encode()
    .unwrap();
    let decoded = RankingProfile::decode(&value).unwrap();
    assert_eq!(decoded.profile, "default");
}
