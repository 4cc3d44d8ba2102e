use crate::core::config::data::{path_display, Config};
use crate::core::model_client::ModelSettings;

impl Config {
    pub fn print_all(&self) {
        let defaults = ModelSettings::default();
        println!("Current configuration:");
        match &self.model {
            Some(model) => println!("  model: {model}"),
            None => println!("  model: {} (default)", defaults.model),
        }
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: {} (default)", defaults.base_url),
        }
        match self.temperature {
            Some(temperature) => println!("  temperature: {temperature}"),
            None => println!("  temperature: {} (default)", defaults.temperature),
        }
        match &self.system_instruction {
            Some(_) => println!("  system-instruction: (custom)"),
            None => println!("  system-instruction: (default)"),
        }
        match self.markdown_enabled() {
            true => println!("  markdown: on"),
            false => println!("  markdown: off"),
        }
        match self.resolve_data_dir() {
            Ok(dir) => println!("  data-dir: {}", path_display(dir)),
            Err(err) => println!("  data-dir: ({err})"),
        }
    }
}
