//! The interactive chat prompt.

use std::error::Error;
use std::io::{self, IsTerminal, Write};

use ratatui::text::Line;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::commands::{message_target, process_input, CommandContext, CommandResult};
use crate::core::config::data::path_display;
use crate::core::config::Config;
use crate::core::conversation::{
    ConversationController, IgnoreReason, SendOutcome, StreamUpdate, SubmitOutcome,
};
use crate::core::message::{now_millis, Role, APOLOGY_TEXT};
use crate::core::session::Session;
use crate::core::store::FileStore;
use crate::ui::renderer::{message_header, Renderer, StreamingPrinter};

pub async fn run_chat(model: Option<String>) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let client = super::build_client(&config, model.as_deref());
    let data_dir = config.resolve_data_dir()?;

    let session = Session::load(Box::new(FileStore::new(&data_dir)));
    let mut controller = ConversationController::new(session, client.clone());
    let renderer = Renderer::new(config.markdown_enabled(), io::stdout().is_terminal());

    let mut out = io::stdout();
    renderer.write_notice(
        &mut out,
        &format!(
            "threadchat · {} · {} saved thread(s) in {}",
            client.settings().model,
            controller.session().threads().len(),
            path_display(&data_dir)
        ),
    )?;
    renderer.write_notice(&mut out, "Type /help for commands, Ctrl+C to stop a reply.")?;
    if let Some(thread) = controller.session().active_thread() {
        renderer.write_transcript(&mut out, thread)?;
    }

    let stdin = BufReader::new(tokio::io::stdin());
    run_repl(&mut controller, renderer, stdin, &mut out, true).await?;
    Ok(())
}

/// Read lines from `input` until end of input or `/quit`, dispatching slash
/// commands and streaming replies for everything else.
pub async fn run_repl<R, W>(
    controller: &mut ConversationController,
    renderer: Renderer,
    input: R,
    out: &mut W,
    show_prompt: bool,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        if show_prompt {
            write!(out, "> ")?;
            out.flush()?;
        }

        let line = tokio::select! {
            line = lines.next_line() => line?,
            Ok(()) = tokio::signal::ctrl_c() => {
                writeln!(out)?;
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        let result = {
            let mut ctx = CommandContext {
                controller: &mut *controller,
                renderer,
                out: &mut *out,
            };
            process_input(&mut ctx, &line)?
        };

        match result {
            CommandResult::Continue => {}
            CommandResult::Quit => break,
            CommandResult::ProcessAsMessage(text) => {
                if text.trim().is_empty() {
                    continue;
                }
                let thread_id = message_target(controller);
                renderer.write_line(out, &message_header(Role::Model, now_millis()))?;
                stream_reply(controller, renderer, &thread_id, &text, out).await?;
                writeln!(out)?;
            }
        }
    }

    debug!("chat loop finished");
    Ok(())
}

/// Submit `text` to `thread_id` and print the reply as it streams in.
/// Ctrl+C cancels the reply and keeps what has arrived so far.
pub async fn stream_reply<W: Write + ?Sized>(
    controller: &mut ConversationController,
    renderer: Renderer,
    thread_id: &str,
    text: &str,
    out: &mut W,
) -> io::Result<SendOutcome> {
    match controller.submit(thread_id, text) {
        SubmitOutcome::Started { .. } => {}
        SubmitOutcome::Ignored(reason) => {
            let notice = match reason {
                IgnoreReason::EmptyInput => "Nothing to send.",
                IgnoreReason::Busy => "A reply is still streaming into this thread.",
                IgnoreReason::UnknownThread => "That thread no longer exists.",
            };
            renderer.write_notice(out, notice)?;
            return Ok(SendOutcome::Ignored(reason));
        }
    }

    let mut printer = StreamingPrinter::new(renderer);
    let mut outcome = SendOutcome::Completed;

    while controller.is_loading(thread_id) {
        tokio::select! {
            event = controller.next_event() => {
                let Some(event) = event else {
                    break;
                };
                match controller.apply(event) {
                    Some(StreamUpdate::Fragment { thread_id: target, text })
                        if target == thread_id =>
                    {
                        printer.push(out, &text)?;
                    }
                    Some(StreamUpdate::Failed { thread_id: target }) if target == thread_id => {
                        printer.finish(out)?;
                        renderer.write_line(out, &Line::raw(APOLOGY_TEXT))?;
                        outcome = SendOutcome::Failed;
                    }
                    _ => {}
                }
            }
            Ok(()) = tokio::signal::ctrl_c() => {
                controller.cancel_stream(thread_id);
                printer.finish(out)?;
                renderer.write_notice(out, "(reply stopped)")?;
            }
        }
    }

    printer.finish(out)?;
    Ok(outcome)
}
