//! Two-phase bootstrap with `ConfigRetriever`.
//!
//! A root config names the components to run; their configs are fetched at
//! the same generation as the root, so the process never combines a new
//! root with stale component configs.
//!
//! # Running
//!
//! ```bash
//! cargo run --example bootstrap
//! ```

use std::sync::Arc;
use std::time::Duration;

use cfgsync::source::ConfigSet;
use cfgsync::{ConfigContext, ConfigKeySet, ConfigRetriever, ConfigSnapshot, ConfigType, SourceSpec};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(ConfigType, Serialize, Deserialize)]
#[config(name = "services")]
struct Services {
    components: Vec<String>,
}

#[derive(ConfigType, Serialize, Deserialize)]
#[config(name = "component")]
struct Component {
    port: u16,
}

const TIMEOUT: Duration = Duration::from_secs(2);

fn component_keys(bootstrap: &ConfigSnapshot) -> miette::Result<ConfigKeySet> {
    let services: Services = bootstrap.get_config("root")?;
    let mut keys = ConfigKeySet::new();
    for id in services.components {
        keys.add::<Component>(id);
    }
    Ok(keys)
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let set = Arc::new(ConfigSet::new());
    set.add(
        "root",
        &Services {
            components: vec!["search".into(), "feed".into()],
        },
    )?;
    set.add("search", &Component { port: 8080 })?;
    set.add("feed", &Component { port: 8081 })?;

    let context = Arc::new(ConfigContext::new(SourceSpec::Set(set)));

    let mut bootstrap_keys = ConfigKeySet::new();
    bootstrap_keys.add::<Services>("root");
    let retriever = ConfigRetriever::new(context, bootstrap_keys)?;

    let (bootstrap, components) = loop {
        let bootstrap = retriever.get_bootstrap_configs(TIMEOUT)?;
        if bootstrap.is_empty() {
            continue;
        }

        let components = retriever.get_configs(&component_keys(&bootstrap)?, TIMEOUT)?;
        if !components.is_empty() {
            break (bootstrap, components);
        }
    };

    println!("bootstrap generation {}", bootstrap.generation());
    for (key, _) in &components {
        let component: Component = components.get_config(key.config_id())?;
        println!("  {} listens on {}", key.config_id(), component.port);
    }

    retriever.close();
    Ok(())
}
