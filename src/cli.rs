//! Command-line argument parsing for toolhost

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

/// toolhost - discover and run packaged tools
#[derive(Parser, Debug)]
#[command(name = "toolhost")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", env = "TOOLHOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory scanned for tool packages
    #[arg(short = 't', long, value_name = "DIR")]
    pub tools_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// List discovered tools
    List,

    /// Show a tool's descriptor and UI schema
    Show {
        /// Tool id
        id: String,
    },

    /// Execute a tool
    Run {
        /// Tool id
        id: String,

        /// Parameters as a JSON object
        #[arg(long, value_name = "JSON", value_parser = parse_params)]
        params: Option<serde_json::Map<String, Value>>,

        /// Single parameter, repeatable; overrides --params
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        param: Vec<(String, Value)>,
    },
}

fn parse_params(s: &str) -> Result<serde_json::Map<String, Value>, String> {
    match serde_json::from_str::<Value>(s) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("parameters must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {}", e)),
    }
}

/// Parse `key=value`; the value is read as JSON when it parses, else as a string
fn parse_param(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err("parameter name is empty".to_string());
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
