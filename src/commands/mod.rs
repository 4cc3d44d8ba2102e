//! Slash commands available at the chat prompt.

mod registry;

pub use registry::{all_commands, find_command, Command, CommandInvocation};

use std::io::{self, Write};

use crate::core::conversation::ConversationController;
use crate::core::session::Session;
use crate::ui::renderer::Renderer;

#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    Quit,
    ProcessAsMessage(String),
}

/// Everything a command may touch while it runs.
pub struct CommandContext<'a> {
    pub controller: &'a mut ConversationController,
    pub renderer: Renderer,
    pub out: &'a mut dyn Write,
}

pub fn process_input(ctx: &mut CommandContext<'_>, input: &str) -> io::Result<CommandResult> {
    let trimmed = input.trim();

    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(CommandResult::ProcessAsMessage(input.to_string()));
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return Ok(CommandResult::ProcessAsMessage(input.to_string())),
    };
    let args = parts.next().unwrap_or("").trim();

    match find_command(command_name) {
        Some(command) => (command.handler)(ctx, CommandInvocation { args }),
        None => Ok(CommandResult::ProcessAsMessage(input.to_string())),
    }
}

/// Resolve a 1-based list position, a full thread id, or an unambiguous id
/// prefix.
pub fn resolve_thread_ref(session: &Session, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    if let Ok(position) = reference.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|index| session.threads().get(index))
            .map(|thread| thread.id.clone());
    }

    if session.contains(reference) {
        return Some(reference.to_string());
    }

    let mut matches = session
        .threads()
        .iter()
        .filter(|thread| thread.id.starts_with(reference));
    match (matches.next(), matches.next()) {
        (Some(thread), None) => Some(thread.id.clone()),
        _ => None,
    }
}

/// The thread a plain message should go to, creating one when none is
/// active.
pub fn message_target(controller: &mut ConversationController) -> String {
    match controller.session().active_thread_id() {
        Some(id) => id.to_string(),
        None => controller.create_thread(),
    }
}

pub(super) fn handle_help(
    ctx: &mut CommandContext<'_>,
    _invocation: CommandInvocation<'_>,
) -> io::Result<CommandResult> {
    writeln!(ctx.out, "Commands:")?;
    for command in all_commands() {
        writeln!(ctx.out, "  {:<16} {}", command.usage, command.help)?;
    }
    writeln!(ctx.out, "Anything else is sent to the active thread.")?;
    Ok(CommandResult::Continue)
}

pub(super) fn handle_new(
    ctx: &mut CommandContext<'_>,
    _invocation: CommandInvocation<'_>,
) -> io::Result<CommandResult> {
    ctx.controller.create_thread();
    ctx.renderer.write_notice(ctx.out, "Started a new thread.")?;
    Ok(CommandResult::Continue)
}

pub(super) fn handle_threads(
    ctx: &mut CommandContext<'_>,
    _invocation: CommandInvocation<'_>,
) -> io::Result<CommandResult> {
    let session = ctx.controller.session();
    ctx.renderer
        .write_thread_list(ctx.out, session.threads(), session.active_thread_id())?;
    Ok(CommandResult::Continue)
}

pub(super) fn handle_switch(
    ctx: &mut CommandContext<'_>,
    invocation: CommandInvocation<'_>,
) -> io::Result<CommandResult> {
    if invocation.args.is_empty() {
        ctx.renderer.write_notice(ctx.out, "Usage: /switch <n|id>")?;
        return Ok(CommandResult::Continue);
    }

    let Some(id) = resolve_thread_ref(ctx.controller.session(), invocation.args) else {
        ctx.renderer.write_notice(
            ctx.out,
            &format!("No thread matches '{}'.", invocation.args),
        )?;
        return Ok(CommandResult::Continue);
    };

    ctx.controller.select_thread(&id);
    if let Some(thread) = ctx.controller.session().thread(&id) {
        ctx.renderer.write_transcript(ctx.out, thread)?;
    }
    Ok(CommandResult::Continue)
}

pub(super) fn handle_delete(
    ctx: &mut CommandContext<'_>,
    invocation: CommandInvocation<'_>,
) -> io::Result<CommandResult> {
    let target = if invocation.args.is_empty() {
        ctx.controller
            .session()
            .active_thread_id()
            .map(str::to_string)
    } else {
        resolve_thread_ref(ctx.controller.session(), invocation.args)
    };

    let Some(id) = target else {
        let message = if invocation.args.is_empty() {
            "No active thread.".to_string()
        } else {
            format!("No thread matches '{}'.", invocation.args)
        };
        ctx.renderer.write_notice(ctx.out, &message)?;
        return Ok(CommandResult::Continue);
    };

    let title = ctx
        .controller
        .session()
        .thread(&id)
        .map(|thread| thread.title.clone())
        .unwrap_or_default();
    ctx.controller.delete_thread(&id);
    ctx.renderer
        .write_notice(ctx.out, &format!("Deleted '{title}'."))?;

    if let Some(active) = ctx.controller.session().active_thread() {
        ctx.renderer
            .write_notice(ctx.out, &format!("Now on '{}'.", active.title))?;
    }
    Ok(CommandResult::Continue)
}

pub(super) fn handle_show(
    ctx: &mut CommandContext<'_>,
    _invocation: CommandInvocation<'_>,
) -> io::Result<CommandResult> {
    match ctx.controller.session().active_thread() {
        Some(thread) => ctx.renderer.write_transcript(ctx.out, thread)?,
        None => ctx.renderer.write_notice(ctx.out, "No active thread.")?,
    }
    Ok(CommandResult::Continue)
}

pub(super) fn handle_quit(
    _ctx: &mut CommandContext<'_>,
    _invocation: CommandInvocation<'_>,
) -> io::Result<CommandResult> {
    Ok(CommandResult::Quit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{create_test_controller, ScriptedClient};

    fn run(controller: &mut ConversationController, input: &str) -> (CommandResult, String) {
        let mut out = Vec::new();
        let result = {
            let mut ctx = CommandContext {
                controller,
                renderer: Renderer::new(true, false),
                out: &mut out,
            };
            process_input(&mut ctx, input).expect("command runs")
        };
        (result, String::from_utf8(out).expect("utf8"))
    }

    #[test]
    fn plain_text_is_a_message() {
        let (mut controller, _store) = create_test_controller(ScriptedClient::default());
        let (result, output) = run(&mut controller, "hello there");
        assert_eq!(result, CommandResult::ProcessAsMessage("hello there".into()));
        assert!(output.is_empty());
    }

    #[test]
    fn unknown_slash_command_is_a_message() {
        let (mut controller, _store) = create_test_controller(ScriptedClient::default());
        let (result, _) = run(&mut controller, "/etc/hosts looks odd");
        assert_eq!(
            result,
            CommandResult::ProcessAsMessage("/etc/hosts looks odd".into())
        );
    }

    #[test]
    fn help_lists_every_command() {
        let (mut controller, _store) = create_test_controller(ScriptedClient::default());
        let (result, output) = run(&mut controller, "/HELP");
        assert_eq!(result, CommandResult::Continue);
        for command in all_commands() {
            assert!(output.contains(command.usage), "missing {}", command.name);
        }
    }

    #[test]
    fn new_creates_and_activates_a_thread() {
        let (mut controller, store) = create_test_controller(ScriptedClient::default());
        run(&mut controller, "/new");
        let first = controller.session().active_thread_id().map(str::to_string);
        run(&mut controller, "/new");

        assert_eq!(controller.session().threads().len(), 2);
        assert_ne!(controller.session().active_thread_id().map(str::to_string), first);
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn switch_by_position_and_prints_transcript() {
        let (mut controller, _store) = create_test_controller(ScriptedClient::default());
        let older = controller.create_thread();
        controller.create_thread();

        let (_, output) = run(&mut controller, "/switch 2");

        assert_eq!(controller.session().active_thread_id(), Some(older.as_str()));
        assert!(output.contains("New Chat"));
        assert!(output.contains("(no messages yet)"));
    }

    #[test]
    fn switch_rejects_unknown_reference() {
        let (mut controller, _store) = create_test_controller(ScriptedClient::default());
        let id = controller.create_thread();

        let (_, output) = run(&mut controller, "/switch 9");
        assert!(output.contains("No thread matches '9'."));
        let (_, output) = run(&mut controller, "/switch");
        assert!(output.contains("Usage"));
        assert_eq!(controller.session().active_thread_id(), Some(id.as_str()));
    }

    #[test]
    fn delete_defaults_to_active_thread() {
        let (mut controller, _store) = create_test_controller(ScriptedClient::default());
        let older = controller.create_thread();
        let newer = controller.create_thread();

        let (_, output) = run(&mut controller, "/delete");

        assert!(!controller.session().contains(&newer));
        assert_eq!(controller.session().active_thread_id(), Some(older.as_str()));
        assert!(output.contains("Deleted 'New Chat'."));
        assert!(output.contains("Now on 'New Chat'."));
    }

    #[test]
    fn delete_without_threads_reports_it() {
        let (mut controller, _store) = create_test_controller(ScriptedClient::default());
        let (_, output) = run(&mut controller, "/delete");
        assert!(output.contains("No active thread."));
    }

    #[test]
    fn resolves_ids_and_prefixes() {
        let (mut controller, _store) = create_test_controller(ScriptedClient::default());
        let id = controller.create_thread();
        let session = controller.session();

        assert_eq!(resolve_thread_ref(session, &id), Some(id.clone()));
        assert_eq!(resolve_thread_ref(session, &id[..8]), Some(id.clone()));
        assert_eq!(resolve_thread_ref(session, "1"), Some(id.clone()));
        assert_eq!(resolve_thread_ref(session, "0"), None);
        assert_eq!(resolve_thread_ref(session, ""), None);
    }

    #[test]
    fn show_prints_active_messages() {
        let (mut controller, _store) = create_test_controller(ScriptedClient::default());
        let (_, output) = run(&mut controller, "/show");
        assert!(output.contains("No active thread."));

        let id = controller.create_thread();
        let target = message_target(&mut controller);
        assert_eq!(target, id);
        assert_eq!(controller.session().threads().len(), 1);
        assert_eq!(controller.session().active_thread_id(), Some(target.as_str()));

        let (_, output) = run(&mut controller, "/show");
        assert!(output.contains("New Chat"));
    }

    #[tokio::test]
    async fn show_renders_exchanged_messages() {
        let (mut controller, _store) =
            create_test_controller(ScriptedClient::fragments(["Hi ", "**there**"]));
        let id = message_target(&mut controller);
        controller.send(&id, "hello").await;

        let (_, output) = run(&mut controller, "/show");

        assert!(output.contains("── hello ──"));
        assert!(output.contains("You · "));
        assert!(output.contains("Gemini · "));
        assert!(output.contains("Hi there"));
    }

    #[test]
    fn message_target_creates_thread_on_demand() {
        let (mut controller, _store) = create_test_controller(ScriptedClient::default());
        let id = message_target(&mut controller);
        assert!(controller.session().contains(&id));
        assert_eq!(message_target(&mut controller), id);
    }

    #[test]
    fn quit_stops_the_loop() {
        let (mut controller, _store) = create_test_controller(ScriptedClient::default());
        let (result, _) = run(&mut controller, "  /quit  ");
        assert_eq!(result, CommandResult::Quit);
    }
}
