//! Integration tests for the retrievers and the background configurer.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use cfgsync::source::ConfigSet;
use cfgsync::{
    ConfigContext, ConfigKeySet, ConfigRetriever, ConfigSnapshot, ConfigureError, Error,
    SimpleConfigRetriever, SimpleConfigurer, SourceSpec,
};
use common::{Bar, Foo, bar, foo, settings};

fn set_context() -> (Arc<ConfigSet>, Arc<ConfigContext>) {
    let set = Arc::new(ConfigSet::new());
    set.add("root", &foo("component-a")).unwrap();
    set.add("component-a", &bar("1")).unwrap();

    let context = Arc::new(ConfigContext::new(SourceSpec::Set(set.clone())).with_settings(settings()));
    (set, context)
}

fn bootstrap_keys() -> ConfigKeySet {
    let mut keys = ConfigKeySet::new();
    keys.add::<Foo>("root");
    keys
}

fn component_keys(bootstrap: &ConfigSnapshot) -> ConfigKeySet {
    let root: Foo = bootstrap.get_config("root").unwrap();
    let mut keys = ConfigKeySet::new();
    keys.add::<Bar>(root.value);
    keys
}

// ============================================================================
// ConfigRetriever
// ============================================================================

#[test]
fn test_two_phase_bootstrap() {
    let (_set, context) = set_context();
    let retriever = ConfigRetriever::new(context, bootstrap_keys()).unwrap();
    assert!(retriever.bootstrap_required());

    let bootstrap = retriever.get_bootstrap_configs(Duration::from_secs(1)).unwrap();
    assert_eq!(bootstrap.generation(), 1);
    assert!(!retriever.bootstrap_required());

    let keys = component_keys(&bootstrap);
    let components = retriever.get_configs(&keys, Duration::from_secs(1)).unwrap();
    assert_eq!(components.generation(), 1);
    assert_eq!(components.get_config::<Bar>("component-a").unwrap(), bar("1"));
}

#[test]
fn test_components_ahead_require_new_bootstrap() {
    let (set, context) = set_context();
    let retriever = ConfigRetriever::new(context.clone(), bootstrap_keys()).unwrap();
    let bootstrap = retriever.get_bootstrap_configs(Duration::from_secs(1)).unwrap();
    let keys = component_keys(&bootstrap);

    // The component subscriber starts after the context moved on.
    set.add("component-a", &bar("2")).unwrap();
    context.reload();

    let components = retriever.get_configs(&keys, Duration::from_secs(1)).unwrap();
    assert!(components.is_empty());
    assert!(retriever.bootstrap_required());
    assert!(matches!(
        retriever.get_configs(&keys, Duration::ZERO),
        Err(Error::BootstrapRequired)
    ));

    let bootstrap = retriever.get_bootstrap_configs(Duration::from_secs(1)).unwrap();
    assert_eq!(bootstrap.generation(), 2);

    let components = retriever.get_configs(&keys, Duration::from_secs(1)).unwrap();
    assert_eq!(components.generation(), 2);
    assert_eq!(components.get_config::<Bar>("component-a").unwrap(), bar("2"));
}

#[test]
fn test_component_only_change_is_delivered() {
    let (set, context) = set_context();
    let retriever = ConfigRetriever::new(context.clone(), bootstrap_keys()).unwrap();
    let bootstrap = retriever.get_bootstrap_configs(Duration::from_secs(1)).unwrap();
    let keys = component_keys(&bootstrap);
    let components = retriever.get_configs(&keys, Duration::from_secs(1)).unwrap();
    assert_eq!(components.get_config::<Bar>("component-a").unwrap(), bar("1"));

    // The root config is untouched: a heartbeat for the bootstrap keys.
    set.add("component-a", &bar("2")).unwrap();
    context.reload();

    let bootstrap = retriever.get_bootstrap_configs(Duration::from_secs(1)).unwrap();
    assert_eq!(bootstrap.generation(), 2);
    assert_eq!(bootstrap.get_config::<Foo>("root").unwrap(), foo("component-a"));

    let components = retriever.get_configs(&keys, Duration::from_secs(1)).unwrap();
    assert_eq!(components.generation(), 2);
    assert_eq!(components.get_config::<Bar>("component-a").unwrap(), bar("2"));
}

#[test]
fn test_changed_component_keys_replace_subscriber() {
    let (set, context) = set_context();
    set.add("component-b", &bar("b")).unwrap();

    let retriever = ConfigRetriever::new(context, bootstrap_keys()).unwrap();
    retriever.get_bootstrap_configs(Duration::from_secs(1)).unwrap();

    let mut first = ConfigKeySet::new();
    first.add::<Bar>("component-a");
    assert_eq!(retriever.get_configs(&first, Duration::from_secs(1)).unwrap().len(), 1);

    let mut second = ConfigKeySet::new();
    second.add::<Bar>("component-a").add::<Bar>("component-b");
    let components = retriever.get_configs(&second, Duration::from_secs(1)).unwrap();
    assert_eq!(components.len(), 2);
    assert_eq!(components.get_config::<Bar>("component-b").unwrap(), bar("b"));
}

#[test]
fn test_unknown_component_key_is_source_error() {
    let (_set, context) = set_context();
    let retriever = ConfigRetriever::new(context, bootstrap_keys()).unwrap();
    retriever.get_bootstrap_configs(Duration::from_secs(1)).unwrap();

    let mut keys = ConfigKeySet::new();
    keys.add::<Bar>("nowhere");
    let err = retriever.get_configs(&keys, Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, Error::Source { .. }));
}

#[test]
fn test_closed_retriever_is_quiet() {
    let (_set, context) = set_context();
    let retriever = ConfigRetriever::new(context, bootstrap_keys()).unwrap();
    retriever.close();
    retriever.close();

    assert!(retriever.get_bootstrap_configs(Duration::from_secs(5)).unwrap().is_empty());
    let mut keys = ConfigKeySet::new();
    keys.add::<Bar>("component-a");
    assert!(retriever.get_configs(&keys, Duration::from_secs(5)).unwrap().is_empty());
}

// ============================================================================
// SimpleConfigRetriever
// ============================================================================

#[test]
fn test_simple_retriever_waits_for_changes() {
    let (set, context) = set_context();
    let mut keys = ConfigKeySet::new();
    keys.add::<Bar>("component-a");
    let retriever = SimpleConfigRetriever::new(context.clone(), keys).unwrap();

    let first = retriever.get_configs(Duration::from_secs(1));
    assert_eq!(first.generation(), 1);

    context.reload();
    assert!(retriever.get_configs(Duration::from_millis(30)).is_empty());

    set.add("component-a", &bar("2")).unwrap();
    context.reload();
    let next = retriever.get_configs(Duration::from_secs(1));
    assert_eq!(next.generation(), 3);
    assert_eq!(next.get_config::<Bar>("component-a").unwrap(), bar("2"));
}

// ============================================================================
// SimpleConfigurer
// ============================================================================

#[test]
fn test_configurer_applies_initial_and_later_snapshots() {
    let (set, context) = set_context();
    let mut keys = ConfigKeySet::new();
    keys.add::<Bar>("component-a");
    let retriever = SimpleConfigRetriever::new(context.clone(), keys).unwrap();

    let applied = Arc::new(AtomicI64::new(0));
    let seen = applied.clone();
    let mut configurer = SimpleConfigurer::new(
        retriever,
        move |snapshot: &ConfigSnapshot| -> Result<(), ConfigureError> {
            seen.store(snapshot.generation(), Ordering::SeqCst);
            Ok(())
        },
    );

    configurer.start().unwrap();
    assert_eq!(applied.load(Ordering::SeqCst), 1);

    set.add("component-a", &bar("2")).unwrap();
    context.reload();

    for _ in 0..200 {
        if applied.load(Ordering::SeqCst) == 2 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(applied.load(Ordering::SeqCst), 2);

    configurer.close();
    assert!(configurer.is_closed());
}

#[test]
fn test_configurer_initial_failure_is_returned() {
    let (_set, context) = set_context();
    let mut keys = ConfigKeySet::new();
    keys.add::<Bar>("component-a");
    let retriever = SimpleConfigRetriever::new(context, keys).unwrap();

    let mut configurer = SimpleConfigurer::new(
        retriever,
        |_: &ConfigSnapshot| -> Result<(), ConfigureError> { Err("refused".into()) },
    );

    let err = configurer.start().unwrap_err();
    assert!(matches!(err, Error::Configure { .. }));
}

#[test]
fn test_configurer_start_retries_after_failure() {
    let (_set, context) = set_context();
    let mut keys = ConfigKeySet::new();
    keys.add::<Bar>("component-a");
    let retriever = SimpleConfigRetriever::new(context, keys).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let applied = Arc::new(AtomicI64::new(0));
    let (counter, seen) = (calls.clone(), applied.clone());
    let mut configurer = SimpleConfigurer::new(
        retriever,
        move |snapshot: &ConfigSnapshot| -> Result<(), ConfigureError> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("not ready".into());
            }
            seen.store(snapshot.generation(), Ordering::SeqCst);
            Ok(())
        },
    );

    assert!(configurer.start().is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    configurer.start().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(applied.load(Ordering::SeqCst), 1);

    configurer.close();
}

#[test]
fn test_configurer_survives_panicking_callback() {
    let (set, context) = set_context();
    let mut keys = ConfigKeySet::new();
    keys.add::<Bar>("component-a");
    let retriever = SimpleConfigRetriever::new(context.clone(), keys).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut configurer = SimpleConfigurer::new(
        retriever,
        move |_: &ConfigSnapshot| -> Result<(), ConfigureError> {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            assert!(call != 1, "second snapshot rejected");
            Ok(())
        },
    );
    configurer.start().unwrap();

    for value in ["2", "3"] {
        set.add("component-a", &bar(value)).unwrap();
        context.reload();
        let expected = if value == "2" { 2 } else { 3 };
        for _ in 0..200 {
            if calls.load(Ordering::SeqCst) >= expected {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    configurer.close();
}
