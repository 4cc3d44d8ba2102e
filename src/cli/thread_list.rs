use std::error::Error;
use std::io::{self, IsTerminal, Write};

use crate::core::config::Config;
use crate::core::session::Session;
use crate::core::store::{FileStore, KeyValueStore};
use crate::ui::renderer::Renderer;

pub fn list_threads() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let store = FileStore::new(config.resolve_data_dir()?);
    let renderer = Renderer::new(config.markdown_enabled(), io::stdout().is_terminal());
    write_saved_threads(Box::new(store), renderer, &mut io::stdout())?;
    Ok(())
}

/// Print the saved threads. The first one is what `chat` opens.
pub fn write_saved_threads<W: Write>(
    store: Box<dyn KeyValueStore>,
    renderer: Renderer,
    out: &mut W,
) -> io::Result<()> {
    let session = Session::load(store);
    renderer.write_thread_list(out, session.threads(), session.active_thread_id())
}
