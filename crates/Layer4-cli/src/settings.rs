//! `procq config` - show or persist runner settings

use anyhow::Context;
use procq_foundation::{JsonStore, RunnerConfig};
use serde_json::Value;

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    action: Option<ConfigAction>,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as JSON (default)
    Show,
    /// Save one key to the project config file
    Set {
        /// camelCase key, e.g. maxRunning
        key: String,
        /// JSON value; anything that does not parse is taken as a string
        value: String,
        /// Write the global file instead of ./.procq/runner.json
        #[arg(long)]
        global: bool,
    },
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    match args.action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let config = RunnerConfig::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Set { key, value, global } => {
            let store = if global {
                JsonStore::global()?
            } else {
                JsonStore::current_project()?
            };
            let path = RunnerConfig::persist(&store, &key, &parse_value(&value))
                .with_context(|| format!("Failed to set {}", key))?;
            println!("{} = {} ({})", key, value, path.display());
        }
    }
    Ok(())
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
