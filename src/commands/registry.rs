use std::io;

use super::{CommandContext, CommandResult};

pub type CommandHandler =
    fn(&mut CommandContext<'_>, CommandInvocation<'_>) -> io::Result<CommandResult>;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "new",
        usage: "/new",
        help: "Start a new thread and switch to it.",
        handler: super::handle_new,
    },
    Command {
        name: "threads",
        usage: "/threads",
        help: "List saved threads, most recent first.",
        handler: super::handle_threads,
    },
    Command {
        name: "switch",
        usage: "/switch <n|id>",
        help: "Switch to a thread by list number or id.",
        handler: super::handle_switch,
    },
    Command {
        name: "delete",
        usage: "/delete [n|id]",
        help: "Delete a thread (the active one by default).",
        handler: super::handle_delete,
    },
    Command {
        name: "show",
        usage: "/show",
        help: "Print the active thread's transcript.",
        handler: super::handle_show,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Leave the chat.",
        handler: super::handle_quit,
    },
];
