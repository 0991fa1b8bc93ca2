use crate::util::{test_store, update_channel, wait_for_update, Level, Reply, ScriptedBucket};
use serde_json::json;

#[tokio::test]
async fn returns_false_if_permissions_are_not_fetched() {
  let test = test_store("any", ScriptedBucket::new(|_| Reply::Never), None, None);

  assert!(!test.store.value("any", "person@email.com"));
  let errors = test.logger.messages(Level::Error);
  assert_eq!(errors, vec!["Permission 'any' does not exist for app 'any'"]);
  assert_eq!(test.bucket.calls(), 0);
}

#[tokio::test]
async fn default_value_and_overrides_test() {
  let (on_update, mut rx) = update_channel();
  let bucket = ScriptedBucket::serving(json!([{
    "permission": { "name": "one", "app": "A", "defaultValue": true },
    "overrides": [{ "userId": "u1", "active": false }]
  }]));
  let test = test_store("A", bucket, None, Some(on_update));
  test.store.install();
  wait_for_update(&mut rx).await;

  assert!(!test.store.value("one", "u1"));
  assert!(test.store.value("one", "u2"));
  assert!(test.logger.messages(Level::Error).is_empty());

  assert!(!test.store.value("two", "u1"));
  let errors = test.logger.messages(Level::Error);
  assert_eq!(errors.len(), 1);
  assert!(errors[0].contains("'two' does not exist"));
  assert!(errors[0].contains("'A'"));
  test.store.uninstall();
}

#[tokio::test]
async fn override_wins_over_default_value_test() {
  let (on_update, mut rx) = update_channel();
  let bucket = ScriptedBucket::serving(json!([
    {
      "permission": { "name": "granted", "app": "app_name", "defaultValue": false },
      "overrides": [{ "userId": "person.one@email.com", "active": true }]
    },
    {
      "permission": { "name": "revoked", "app": "app_name", "defaultValue": true },
      "overrides": [{ "userId": "person.one@email.com", "active": false }]
    }
  ]));
  let test = test_store("app_name", bucket, None, Some(on_update));
  test.store.install();
  wait_for_update(&mut rx).await;

  assert!(test.store.value("granted", "person.one@email.com"));
  assert!(!test.store.value("granted", "person.two@email.com"));
  assert!(!test.store.value("revoked", "person.one@email.com"));
  assert!(test.store.value("revoked", "person.two@email.com"));
  test.store.uninstall();
}

#[tokio::test]
async fn other_applications_are_ignored_test() {
  let (on_update, mut rx) = update_channel();
  let bucket = ScriptedBucket::serving(json!([
    {
      "permission": { "name": "one", "app": "app_name", "defaultValue": true },
      "overrides": [
        { "userId": "person.one@email.com", "active": true },
        { "userId": "person.two@email.com", "active": false }
      ]
    },
    {
      "permission": { "name": "one", "app": "another_application", "defaultValue": false }
    },
    {
      "permission": { "name": "two", "app": "another_application", "defaultValue": true },
      "overrides": [{ "userId": "person.one@email.com", "active": true }]
    }
  ]));
  let test = test_store("app_name", bucket, None, Some(on_update));
  test.store.install();
  wait_for_update(&mut rx).await;

  assert!(test.store.value("one", "person.one@email.com"));
  assert!(!test.store.value("one", "person.two@email.com"));
  assert!(test.store.value("one", "person.three@email.com"));
  assert!(!test.store.value("two", "person.one@email.com"));
  assert_eq!(test.store.permission_names(), vec!["one".to_string()]);
  test.store.uninstall();
}
