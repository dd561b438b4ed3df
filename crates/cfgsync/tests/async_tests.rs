//! Integration tests for the async wrappers.

#![cfg(feature = "async")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use cfgsync::{ConfigKeySet, ConfigSubscriber, SimpleConfigRetriever};
use common::{Bar, Foo, ManualSourceFactory, bar, foo};

#[tokio::test(flavor = "multi_thread")]
async fn test_next_config_async_commits() {
    let factory = ManualSourceFactory::new();
    factory.initial("id", &foo("a"));
    let subscriber = Arc::new(ConfigSubscriber::new(factory.context()));
    let handle = subscriber.subscribe::<Foo>("id").unwrap();

    assert!(subscriber.next_config_async(Duration::from_secs(1)).await);
    assert_eq!(handle.get().unwrap(), foo("a"));

    factory.push("id", &foo("a"), 2);
    assert!(!subscriber.next_config_async(Duration::from_millis(30)).await);
    assert!(subscriber.next_generation_async(Duration::from_secs(1)).await);
    assert_eq!(subscriber.generation(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_close_wakes_async_wait() {
    let factory = ManualSourceFactory::new();
    factory.initial("id", &foo("a"));
    let subscriber = Arc::new(ConfigSubscriber::new(factory.context()));
    subscriber.subscribe::<Foo>("id").unwrap();
    assert!(subscriber.next_config_async(Duration::from_secs(1)).await);

    let waiting = {
        let subscriber = subscriber.clone();
        tokio::spawn(async move { subscriber.next_config_async(Duration::from_secs(30)).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    subscriber.close();

    let result = tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .expect("wait did not finish after close")
        .unwrap();
    assert!(!result);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_configs_async() {
    let factory = ManualSourceFactory::new();
    factory.initial("id", &bar("b"));

    let mut keys = ConfigKeySet::new();
    keys.add::<Bar>("id");
    let retriever = Arc::new(SimpleConfigRetriever::new(factory.context(), keys).unwrap());

    let snapshot = retriever.get_configs_async(Duration::from_secs(1)).await;
    assert_eq!(snapshot.generation(), 1);
    assert_eq!(snapshot.get_config::<Bar>("id").unwrap(), bar("b"));

    retriever.close();
    assert!(retriever.get_configs_async(Duration::from_secs(5)).await.is_empty());
}
