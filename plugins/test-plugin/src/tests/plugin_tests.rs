use dotbot_core::command::{CommandScope, Invocation};
use dotbot_core::plugin_system::{PluginManager, PluginState};
use dotbot_core::storage::{BotSettings, ConfigManager};
use dotbot_core::Host;
use tempfile::{TempDir, tempdir};

use crate::{EntryStore, SETTINGS_DOCUMENT, TEST_PLUGIN_ID, TestModuleSettings, descriptor};

async fn started(dir: &TempDir) -> PluginManager {
    let host = Host::new(ConfigManager::new(dir.path()), BotSettings::default());
    let mut manager = PluginManager::new(host);
    manager.load(vec![descriptor()]).unwrap();
    assert!(manager.start_all().await.is_empty());
    manager
}

async fn reply(manager: &PluginManager, invocation: Invocation) -> String {
    manager.host().dispatcher().respond(invocation).await.content
}

fn entry(action: &str) -> Invocation {
    Invocation::new(CommandScope::Global, "testentry").with_path([action])
}

#[test]
fn entry_store_rejects_duplicates_and_unknown_keys() {
    let store = EntryStore::default();
    assert!(store.add("a", "1"));
    assert!(!store.add("a", "2"));
    assert_eq!(store.get("a").as_deref(), Some("1"));
    assert!(store.update("a", "3"));
    assert!(!store.update("b", "3"));
    assert!(store.delete("a"));
    assert!(!store.delete("a"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn start_registers_all_commands() {
    let dir = tempdir().unwrap();
    let manager = started(&dir).await;

    assert_eq!(manager.state(TEST_PLUGIN_ID), Some(PluginState::Running));
    let names: Vec<String> = manager
        .plugin_context(TEST_PLUGIN_ID)
        .unwrap()
        .owned_commands()
        .into_iter()
        .map(|id| id.name)
        .collect();
    assert_eq!(names, vec!["test", "testentry", "testgroup"]);
    assert!(dir.path().join(format!("{}.json", SETTINGS_DOCUMENT)).is_file());
}

#[tokio::test]
async fn entry_commands_round_trip_through_dispatcher() {
    let dir = tempdir().unwrap();
    let manager = started(&dir).await;

    let added = reply(&manager, entry("add").with_arg("key", "color").with_arg("value", "blue")).await;
    assert_eq!(added, "Added entry color with value 'blue'");
    let got = reply(&manager, entry("get").with_arg("key", "color")).await;
    assert_eq!(got, "The value of key color is 'blue'");

    let updated = reply(&manager, entry("update").with_arg("key", "color").with_arg("value", "red")).await;
    assert_eq!(updated, "Successfully updated entry for key color");
    let got = reply(&manager, entry("get").with_arg("key", "color")).await;
    assert_eq!(got, "The value of key color is 'red'");

    let deleted = reply(&manager, entry("delete").with_arg("key", "color")).await;
    assert_eq!(deleted, "The entry associated with key color has been deleted!");
    let missing = manager
        .host()
        .dispatcher()
        .respond(entry("get").with_arg("key", "color"))
        .await;
    assert!(missing.ephemeral);
    assert_eq!(missing.content, "No entry found for key color");
}

#[tokio::test]
async fn nested_group_reaches_sub_command() {
    let dir = tempdir().unwrap();
    let manager = started(&dir).await;

    let invocation = Invocation::new(CommandScope::Global, "testgroup")
        .with_path(["testgroup1", "testsubcommand"])
        .with_arg("testval2", "hello");
    assert_eq!(reply(&manager, invocation).await, "Your sub command argument is hello");

    // Stopping at the group is not executable
    let group_only = Invocation::new(CommandScope::Global, "testgroup").with_path(["testgroup1"]);
    assert_eq!(reply(&manager, group_only).await, "This command is currently unavailable.");
}

#[tokio::test]
async fn disabled_entries_skip_entry_command() {
    let dir = tempdir().unwrap();
    let config = ConfigManager::new(dir.path());
    let settings = TestModuleSettings {
        entries_enabled: false,
        ..TestModuleSettings::default()
    };
    config.save_document(SETTINGS_DOCUMENT, &settings).unwrap();

    let manager = started(&dir).await;
    let registry = manager.host().registry();
    assert!(registry.lookup(CommandScope::Global, "test").is_some());
    assert!(registry.lookup(CommandScope::Global, "testentry").is_none());
}

#[tokio::test]
async fn stop_releases_commands() {
    let dir = tempdir().unwrap();
    let manager = started(&dir).await;

    manager.stop(TEST_PLUGIN_ID).await.unwrap();
    assert_eq!(manager.state(TEST_PLUGIN_ID), Some(PluginState::Stopped));
    assert!(manager.host().registry().is_empty());
    assert_eq!(
        reply(&manager, Invocation::new(CommandScope::Global, "test")).await,
        "This command is currently unavailable."
    );
}
