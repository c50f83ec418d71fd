use anyhow::{bail, Result};
use std::env;
use tracing::info;

use crate::Config;

pub async fn run(force: bool) -> Result<()> {
    let root = env::current_dir()?;

    if Config::is_initialized(&root) && !force {
        bail!(
            "codesift is already initialized in {:?} (use --force to overwrite)",
            Config::codesift_dir(&root)
        );
    }

    let config = Config::default();
    config.save(&root)?;

    info!("Initialized codesift in {:?}", Config::codesift_dir(&root));
    println!(
        "✓ Created {} with default configuration",
        Config::codesift_dir(&root).display()
    );
    println!("\nNext steps:");
    println!("  1. Edit .codesift/config.toml to customize settings");
    println!("  2. Run 'codesift index' to extract and index symbols");
    println!("  3. Run 'codesift search <query>' to search them");

    Ok(())
}
