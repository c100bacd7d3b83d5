use dotbot_core::command::{
    CommandArgs, CommandContext, CommandOption, CommandResponse, HandlerError, ValueType, handler_fn,
};

use crate::entries::EntryStore;

type Reply = Result<CommandResponse, HandlerError>;

pub(crate) fn test_command() -> CommandOption {
    CommandOption::command("test", "For testing DotBotBase").handler(handler_fn(|_ctx| async {
        Reply::Ok(CommandResponse::message("DotBot is up and running!"))
    }))
}

fn key_option(description: &str) -> CommandOption {
    CommandOption::value("key", description, ValueType::String)
        .required(true)
        .max_length(100)
}

// Handlers only run after required options were validated
fn arg<'a>(args: &'a CommandArgs, name: &str) -> Result<&'a str, HandlerError> {
    args.get_str(name)
        .ok_or_else(|| format!("missing argument '{}'", name).into())
}

fn add_entry(store: &EntryStore, args: &CommandArgs) -> Reply {
    let key = arg(args, "key")?;
    let value = args.get_str("value").unwrap_or_default();
    if !store.add(key, value) {
        return Ok(CommandResponse::ephemeral(format!("An entry with key {} already exists!", key)));
    }
    Ok(CommandResponse::message(format!("Added entry {} with value '{}'", key, value)))
}

fn get_entry(store: &EntryStore, args: &CommandArgs) -> Reply {
    let key = arg(args, "key")?;
    Ok(match store.get(key) {
        Some(value) => CommandResponse::message(format!("The value of key {} is '{}'", key, value)),
        None => CommandResponse::ephemeral(format!("No entry found for key {}", key)),
    })
}

fn delete_entry(store: &EntryStore, args: &CommandArgs) -> Reply {
    let key = arg(args, "key")?;
    if !store.delete(key) {
        return Ok(CommandResponse::ephemeral(format!("No entry found for key {}", key)));
    }
    Ok(CommandResponse::message(format!(
        "The entry associated with key {} has been deleted!",
        key
    )))
}

fn update_entry(store: &EntryStore, args: &CommandArgs) -> Reply {
    let key = arg(args, "key")?;
    let value = arg(args, "value")?;
    if !store.update(key, value) {
        return Ok(CommandResponse::ephemeral(format!("No entry found for key {}", key)));
    }
    Ok(CommandResponse::message(format!("Successfully updated entry for key {}", key)))
}

/// Sub-command bound to `action` over a shared store
fn entry_sub_command(
    name: &str,
    description: &str,
    store: &EntryStore,
    action: fn(&EntryStore, &CommandArgs) -> Reply,
) -> CommandOption {
    let store = store.clone();
    CommandOption::sub_command(name, description).handler(handler_fn(move |ctx: CommandContext| {
        let store = store.clone();
        async move { action(&store, &ctx.args) }
    }))
}

pub(crate) fn entry_command(store: &EntryStore) -> CommandOption {
    CommandOption::command("testentry", "Interaction with the test entry")
        .option(
            entry_sub_command("add", "Adds a simple test entry to database", store, add_entry)
                .option(key_option("The key of the value to add"))
                .option(CommandOption::value("value", "The value to add", ValueType::String)),
        )
        .option(
            entry_sub_command("get", "Gets a simple test entry from the database", store, get_entry)
                .option(key_option("The key of the value to get")),
        )
        .option(
            entry_sub_command("delete", "Deletes the simple test entry based on key", store, delete_entry)
                .option(key_option("The key of the entry to delete")),
        )
        .option(
            entry_sub_command("update", "Update the value of a given key", store, update_entry)
                .option(key_option("The key of the entry to update"))
                .option(
                    CommandOption::value("value", "The new value to set the entry to", ValueType::String)
                        .required(true),
                ),
        )
}

fn echo_sub_command(args: &CommandArgs) -> Reply {
    let value = arg(args, "testval2")?;
    Ok(CommandResponse::message(format!("Your sub command argument is {}", value)))
}

pub(crate) fn group_command() -> CommandOption {
    let sub_command = CommandOption::sub_command("testsubcommand", "Simple test sub command")
        .option(CommandOption::value("testval2", "Simple test val 2", ValueType::String).required(true))
        .handler(handler_fn(|ctx: CommandContext| async move { echo_sub_command(&ctx.args) }));
    CommandOption::command("testgroup", "Simple test group")
        .option(CommandOption::group("testgroup1", "Nested test group").option(sub_command))
}
