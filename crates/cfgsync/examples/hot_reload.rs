//! Hot reload example: file edits flow through to a subscriber.
//!
//! # Running
//!
//! ```bash
//! cargo run --example hot_reload --features watch
//!
//! # In another terminal, modify the config
//! echo 'threads = 16' > /tmp/cfgsync_example/search.toml
//! ```

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use cfgsync::{ConfigContext, ConfigSubscriber, ConfigType, SourceSpec, WatchBuilder};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(ConfigType, Serialize, Deserialize, Debug)]
#[config(name = "search")]
struct Search {
    threads: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("cfgsync=info"))
        .init();

    let dir = std::env::temp_dir().join("cfgsync_example");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("search.toml"), "threads = 4\n")?;

    println!("Config directory: {}", dir.display());
    println!("Modify search.toml to see hot reload in action!\n");

    let context = Arc::new(ConfigContext::new(SourceSpec::Dir(dir.clone())));
    let subscriber = ConfigSubscriber::new(context.clone());
    let search = subscriber.subscribe::<Search>("default")?;

    let watcher = WatchBuilder::new()
        .watch_path(&dir)
        .debounce(Duration::from_millis(200))
        .on_reload(|generation| println!("reloaded, now at generation {generation}"))
        .start(context)?;

    for _ in 0..30 {
        if subscriber.next_config(Duration::from_secs(2)) {
            println!("generation {}: {:?}", subscriber.generation(), search.get()?);
        }
    }

    watcher.stop();
    Ok(())
}
