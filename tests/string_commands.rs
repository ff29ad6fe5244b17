mod common;

use std::time::Duration;

use kvbridge::{Error, KvClient};

async fn strings_behave(client: &KvClient) {
    assert_eq!(client.get("greeting").await.unwrap(), None);

    client.set("greeting", "hello").await.unwrap();
    assert_eq!(client.get("greeting").await.unwrap().as_deref(), Some("hello"));

    client.set("greeting", "").await.unwrap();
    assert_eq!(client.get("greeting").await.unwrap().as_deref(), Some(""));

    assert!(client.set_if_not_exist("lock", "a").await.unwrap());
    assert!(!client.set_if_not_exist("lock", "b").await.unwrap());
    assert_eq!(client.get("lock").await.unwrap().as_deref(), Some("a"));

    assert_eq!(client.incr("counter").await.unwrap(), 1);
    assert_eq!(client.incr("counter").await.unwrap(), 2);
}

#[tokio::test]
async fn test_strings_standalone() {
    let (_server, client) = common::standalone().await;
    strings_behave(&client).await;
}

#[tokio::test]
async fn test_strings_cluster() {
    let (_cluster, client) = common::clustered().await;
    strings_behave(&client).await;
}

#[tokio::test]
async fn test_set_with_expiry() {
    let (server, client) = common::standalone().await;

    client.set_with_expiry("session", "abc", 10).await.unwrap();
    let ttl = client.ttl("session").await.unwrap();
    assert!((9..=10).contains(&ttl), "ttl was {}", ttl);

    server.fast_forward(Duration::from_secs(11));
    assert_eq!(client.get("session").await.unwrap(), None);
    assert_eq!(client.ttl("session").await.unwrap(), -2);
}

#[tokio::test]
async fn test_incr_on_text_is_a_server_error() {
    let (_server, client) = common::standalone().await;

    client.set("name", "alice").await.unwrap();
    let err = client.incr("name").await.unwrap_err();
    assert!(matches!(err, Error::Server { .. }), "got {:?}", err);
    assert!(!err.is_transient());
}
