//! One-shot `say` command: nothing is written to disk.

use std::error::Error;
use std::io::{self, IsTerminal};

use crate::core::config::Config;
use crate::core::conversation::{ConversationController, SendOutcome};
use crate::core::session::Session;
use crate::core::store::MemoryStore;
use crate::ui::renderer::Renderer;

use super::chat::stream_reply;

pub async fn run_say(prompt: Vec<String>, model: Option<String>) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: threadchat say <prompt>");
        std::process::exit(1);
    }

    let config = Config::load()?;
    let client = super::build_client(&config, model.as_deref());
    let session = Session::empty(Box::new(MemoryStore::ephemeral()));
    let mut controller = ConversationController::new(session, client);
    let renderer = Renderer::new(config.markdown_enabled(), io::stdout().is_terminal());

    let thread_id = controller.create_thread();
    let mut out = io::stdout();
    match stream_reply(&mut controller, renderer, &thread_id, &prompt, &mut out).await? {
        SendOutcome::Completed => Ok(()),
        SendOutcome::Failed | SendOutcome::Ignored(_) => std::process::exit(1),
    }
}
