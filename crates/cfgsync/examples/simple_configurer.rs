//! Background reconfiguration with `SimpleConfigurer`.
//!
//! An in-memory config set plays the role of the config server. The main
//! thread edits it and reloads the context; the configurer thread receives
//! one snapshot per changed generation.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=cfgsync=debug cargo run --example simple_configurer
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cfgsync::source::ConfigSet;
use cfgsync::{
    ConfigContext, ConfigKeySet, ConfigSnapshot, ConfigType, ConfigureError, SimpleConfigRetriever,
    SimpleConfigurer, SourceSpec, SubscriberSettings,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(ConfigType, Serialize, Deserialize, Debug)]
#[config(name = "worker_pool")]
struct WorkerPool {
    threads: u32,
}

#[derive(ConfigType, Serialize, Deserialize, Debug)]
#[config(name = "cache")]
struct Cache {
    capacity_mb: u64,
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let set = Arc::new(ConfigSet::new());
    set.add("frontend", &WorkerPool { threads: 4 })?;
    set.add("frontend", &Cache { capacity_mb: 256 })?;

    let settings = SubscriberSettings::new().with_next_config_timeout(Duration::from_millis(500));
    let context = Arc::new(ConfigContext::new(SourceSpec::Set(set.clone())).with_settings(settings));

    let mut keys = ConfigKeySet::new();
    keys.add::<WorkerPool>("frontend").add::<Cache>("frontend");
    let retriever = SimpleConfigRetriever::new(context.clone(), keys)?;

    let mut configurer = SimpleConfigurer::new(
        retriever,
        |snapshot: &ConfigSnapshot| -> Result<(), ConfigureError> {
            let pool: WorkerPool = snapshot.get_config("frontend")?;
            let cache: Cache = snapshot.get_config("frontend")?;
            println!(
                "generation {}: {} threads, {} MB cache",
                snapshot.generation(),
                pool.threads,
                cache.capacity_mb
            );
            Ok(())
        },
    );
    configurer.start()?;

    for threads in [8, 16] {
        thread::sleep(Duration::from_millis(200));
        set.add("frontend", &WorkerPool { threads })?;
        context.reload();
    }

    // A heartbeat: nothing changed, so no callback.
    context.reload();

    thread::sleep(Duration::from_millis(200));
    configurer.close();
    Ok(())
}
