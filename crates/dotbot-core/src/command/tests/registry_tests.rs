#![cfg(test)]

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::command::{
    CommandError, CommandHandler, CommandId, CommandListener, CommandOption, CommandRegistry,
    CommandResponse, CommandScope, RegisteredCommand, handler_fn,
};

fn simple_command(name: &str) -> CommandOption {
    CommandOption::command(name, "A test command").handler(ok_handler())
}

fn ok_handler() -> impl CommandHandler + 'static {
    handler_fn(|_ctx| async { Ok(CommandResponse::message("ok")) })
}

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl CommandListener for RecordingListener {
    fn command_registered(&self, command: &RegisteredCommand) {
        self.events.lock().unwrap().push(format!("+{}", command.id()));
    }

    fn command_unregistered(&self, id: &CommandId) {
        self.events.lock().unwrap().push(format!("-{}", id));
    }
}

#[test]
fn test_register_and_lookup() {
    let registry = CommandRegistry::new();
    let id = registry
        .register(CommandScope::Global, simple_command("test"), "plugin.a")
        .expect("registration should succeed");

    assert_eq!(id, CommandId::new(CommandScope::Global, "test"));
    let found = registry.lookup(CommandScope::Global, "test").expect("command should be found");
    assert_eq!(found.owner, "plugin.a");
    assert!(registry.lookup(CommandScope::Guild(1), "test").is_none());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_name_collision_first_wins() {
    let registry = CommandRegistry::new();
    registry.register(CommandScope::Global, simple_command("test"), "plugin.a").unwrap();

    let err = registry
        .register(CommandScope::Global, simple_command("test"), "plugin.b")
        .unwrap_err();
    assert_eq!(
        err,
        CommandError::CommandNameCollision {
            scope: CommandScope::Global,
            name: "test".to_string()
        }
    );
    assert_eq!(registry.lookup(CommandScope::Global, "test").unwrap().owner, "plugin.a");

    // Same name in another scope is fine
    registry.register(CommandScope::Guild(42), simple_command("test"), "plugin.b").unwrap();
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_invalid_tree_is_not_stored() {
    let registry = CommandRegistry::new();
    let bad = CommandOption::command("broken", "Broken").option(CommandOption::sub_command("add", "Add"));

    let err = registry.register(CommandScope::Global, bad, "plugin.a").unwrap_err();
    assert!(matches!(err, CommandError::InvalidCommandTree { .. }));
    assert!(registry.is_empty());
}

#[test]
fn test_all_roots_in_registration_order() {
    let registry = CommandRegistry::new();
    for name in ["zeta", "alpha", "mid"] {
        registry.register(CommandScope::Global, simple_command(name), "plugin.a").unwrap();
    }
    registry.register(CommandScope::Guild(7), simple_command("guildonly"), "plugin.a").unwrap();

    let names: Vec<String> = registry
        .all_roots(CommandScope::Global)
        .iter()
        .map(|r| r.root.name().to_string())
        .collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    assert_eq!(registry.scopes(), vec![CommandScope::Global, CommandScope::Guild(7)]);
}

#[test]
fn test_unregister_owned() {
    let registry = CommandRegistry::new();
    registry.register(CommandScope::Global, simple_command("a"), "plugin.a").unwrap();
    registry.register(CommandScope::Global, simple_command("b"), "plugin.b").unwrap();
    registry.register(CommandScope::Guild(1), simple_command("c"), "plugin.a").unwrap();

    let removed = registry.unregister_owned("plugin.a");
    assert_eq!(
        removed,
        vec![
            CommandId::new(CommandScope::Global, "a"),
            CommandId::new(CommandScope::Guild(1), "c")
        ]
    );
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.owned_by("plugin.b").len(), 1);

    // Safe for a plugin that never registered anything
    assert!(registry.unregister_owned("plugin.none").is_empty());

    // The name is free again
    registry.register(CommandScope::Global, simple_command("a"), "plugin.b").unwrap();
}

#[test]
fn test_listeners_notified_in_order() {
    let registry = CommandRegistry::new();
    let first = Arc::new(RecordingListener::default());
    let second = Arc::new(RecordingListener::default());
    registry.add_listener(first.clone());
    registry.add_listener(second.clone());

    registry.register(CommandScope::Global, simple_command("test"), "plugin.a").unwrap();
    let _ = registry.register(CommandScope::Global, simple_command("test"), "plugin.b");
    registry.unregister(&CommandId::new(CommandScope::Global, "test"));

    let expected = vec!["+global/test".to_string(), "-global/test".to_string()];
    assert_eq!(*first.events.lock().unwrap(), expected);
    assert_eq!(*second.events.lock().unwrap(), expected);
}

#[test]
fn test_concurrent_registration_single_winner() {
    let registry = Arc::new(CommandRegistry::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                registry
                    .register(CommandScope::Global, simple_command("race"), &format!("plugin.{}", i))
                    .is_ok()
            })
        })
        .collect();

    let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
    assert_eq!(winners, 1);
    assert_eq!(registry.len(), 1);
}

/// Records registrations after a delay, reading the registry from inside the callback.
struct SlowListener {
    registry: Weak<CommandRegistry>,
    names: Mutex<Vec<String>>,
}

impl CommandListener for SlowListener {
    fn command_registered(&self, command: &RegisteredCommand) {
        if command.root.name().ends_with(['0', '2', '4', '6']) {
            std::thread::sleep(Duration::from_millis(5));
        }
        if let Some(registry) = self.registry.upgrade() {
            assert!(registry.lookup(command.scope, command.root.name()).is_some());
        }
        self.names.lock().unwrap().push(command.root.name().to_string());
    }
}

#[test]
fn test_concurrent_notifications_follow_registration_order() {
    let registry = Arc::new(CommandRegistry::new());
    let listener = Arc::new(SlowListener {
        registry: Arc::downgrade(&registry),
        names: Mutex::new(Vec::new()),
    });
    registry.add_listener(listener.clone());

    std::thread::scope(|scope| {
        for i in 0..8 {
            let registry = &registry;
            scope.spawn(move || {
                registry
                    .register(CommandScope::Global, simple_command(&format!("cmd{}", i)), "plugin.a")
                    .unwrap();
            });
        }
    });

    let registered: Vec<String> = registry
        .all_roots(CommandScope::Global)
        .iter()
        .map(|c| c.root.name().to_string())
        .collect();
    assert_eq!(registered.len(), 8);
    assert_eq!(*listener.names.lock().unwrap(), registered);
}
