//! Integration tests for the built-in sources.

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use cfgsync::source::{ConfigSet, PayloadFormat};
use cfgsync::{ConfigContext, ConfigKey, ConfigSubscriber, ConfigValue, Error, SourceSpec};
use common::{Bar, Foo, bar, foo, settings};
use tempfile::tempdir;

fn context(spec: SourceSpec) -> Arc<ConfigContext> {
    Arc::new(ConfigContext::new(spec).with_settings(settings()))
}

// ============================================================================
// Raw
// ============================================================================

#[test]
fn test_raw_payload_serves_every_key() {
    let subscriber = ConfigSubscriber::new(context(SourceSpec::Raw(r#"{"value":"raw"}"#.into())));
    let a = subscriber.subscribe::<Foo>("one").unwrap();
    let b = subscriber.subscribe::<Bar>("two").unwrap();

    assert!(subscriber.next_config_now());
    assert_eq!(a.get().unwrap(), foo("raw"));
    assert_eq!(b.get().unwrap(), bar("raw"));
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn test_file_source_rereads_on_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.json");
    fs::write(&path, r#"{"value":"v1"}"#).unwrap();

    let context = context(SourceSpec::File(path.clone()));
    let subscriber = ConfigSubscriber::new(context.clone());
    let handle = subscriber.subscribe::<Foo>("id").unwrap();
    assert!(subscriber.next_config_now());
    assert_eq!(handle.get().unwrap(), foo("v1"));

    fs::write(&path, r#"{"value":"v2"}"#).unwrap();
    assert_eq!(context.reload(), 2);
    assert!(subscriber.next_config(Duration::from_secs(1)));
    assert_eq!(handle.get().unwrap(), foo("v2"));
    assert_eq!(handle.generation(), 2);
}

#[cfg(feature = "toml")]
#[test]
fn test_toml_file_is_canonical_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.toml");
    fs::write(&path, "value = \"from toml\"\n").unwrap();

    let subscriber = ConfigSubscriber::new(context(SourceSpec::File(path)));
    let handle = subscriber.subscribe::<Foo>("id").unwrap();
    assert!(subscriber.next_config_now());
    assert_eq!(handle.get().unwrap(), foo("from toml"));
}

#[test]
fn test_missing_file_fails_subscribe() {
    let dir = tempdir().unwrap();
    let subscriber = ConfigSubscriber::new(context(SourceSpec::File(dir.path().join("nope.json"))));

    let err = subscriber.subscribe::<Foo>("id").unwrap_err();
    assert!(matches!(err, Error::Source { .. }));
}

#[test]
fn test_broken_file_keeps_previous_value() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.json");
    fs::write(&path, r#"{"value":"good"}"#).unwrap();

    let context = context(SourceSpec::File(path.clone()));
    let subscriber = ConfigSubscriber::new(context.clone());
    let handle = subscriber.subscribe::<Foo>("id").unwrap();
    assert!(subscriber.next_config_now());

    fs::write(&path, r#"{"value": "#).unwrap();
    context.reload();
    assert!(!subscriber.next_generation(Duration::from_millis(30)));
    assert_eq!(handle.get().unwrap(), foo("good"));
}

#[test]
fn test_dir_source_picks_file_per_definition() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("foo.json"), r#"{"value":"json"}"#).unwrap();
    #[cfg(feature = "yaml")]
    fs::write(dir.path().join("bar.yaml"), "value: yaml\n").unwrap();
    #[cfg(not(feature = "yaml"))]
    fs::write(dir.path().join("bar.json"), r#"{"value":"yaml"}"#).unwrap();

    let subscriber = ConfigSubscriber::new(context(SourceSpec::Dir(dir.path().to_path_buf())));
    let a = subscriber.subscribe::<Foo>("id").unwrap();
    let b = subscriber.subscribe::<Bar>("id").unwrap();

    assert!(subscriber.next_config_now());
    assert_eq!(a.get().unwrap(), foo("json"));
    assert_eq!(b.get().unwrap(), bar("yaml"));
}

#[test]
fn test_dir_source_reports_missing_definition() {
    let dir = tempdir().unwrap();
    let subscriber = ConfigSubscriber::new(context(SourceSpec::Dir(dir.path().to_path_buf())));

    let err = subscriber.subscribe::<Foo>("id").unwrap_err();
    assert!(err.to_string().contains("config.foo"));
}

// ============================================================================
// Config Set
// ============================================================================

#[test]
fn test_config_set_updates_on_reload() {
    let set = Arc::new(ConfigSet::new());
    set.add("id", &foo("one")).unwrap();

    let context = context(SourceSpec::Set(set.clone()));
    let subscriber = ConfigSubscriber::new(context.clone());
    let handle = subscriber.subscribe::<Foo>("id").unwrap();
    assert!(subscriber.next_config_now());

    set.set_value(ConfigKey::of::<Foo>("id"), ConfigValue::new(r#"{"value":"two"}"#));
    context.reload();
    assert!(subscriber.next_config(Duration::from_secs(1)));
    assert_eq!(handle.get().unwrap(), foo("two"));
}

#[test]
fn test_config_set_removal_stalls_generation() {
    let set = Arc::new(ConfigSet::new());
    set.add("id", &foo("one")).unwrap();

    let context = context(SourceSpec::Set(set.clone()));
    let subscriber = ConfigSubscriber::new(context.clone());
    let handle = subscriber.subscribe::<Foo>("id").unwrap();
    assert!(subscriber.next_config_now());

    assert!(set.remove(&ConfigKey::of::<Foo>("id")).is_some());
    context.reload();
    assert!(!subscriber.next_generation(Duration::from_millis(30)));
    assert_eq!(handle.get().unwrap(), foo("one"));
}

// ============================================================================
// Payload Formats
// ============================================================================

#[test]
fn test_format_from_path() {
    assert_eq!(
        PayloadFormat::from_path("a.json".as_ref()),
        Some(PayloadFormat::Json)
    );
    assert_eq!(PayloadFormat::from_path("a.ini".as_ref()), None);
    assert_eq!(PayloadFormat::from_path("noext".as_ref()), None);
}

#[test]
fn test_json_parse_error_points_at_input() {
    let err = PayloadFormat::Json
        .parse_named("app.json", "{\n  \"value\": ,\n}")
        .unwrap_err();
    assert!(err.to_string().contains("app.json") || err.message().contains("expected"));
}
