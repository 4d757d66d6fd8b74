//! Init command - write an example experiment config

use anyhow::Result;
use console::style;
use smad::config::{init_config, CONFIG_FILE_NAME};
use std::path::Path;

/// Run the init command
pub fn run(path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or_else(|| Path::new(CONFIG_FILE_NAME));
    if init_config(path)? {
        println!("{} Created {}", style("✓").green(), style(path.display()).cyan());
    } else {
        println!(
            "{} Config already exists at {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }
    Ok(())
}
