use crate::strategy;
use anyhow::{Context, Result};

pub fn run() -> Result<()> {
    let listing = strategy::list_all();
    let json =
        serde_json::to_string_pretty(&listing).context("failed to serialize strategy listing")?;
    println!("{}", json);
    Ok(())
}
