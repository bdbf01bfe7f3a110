//! # CLI
//!
//! This module defines the command-line interface of `kodirpc` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring call
//! targets are `Namespace.method` and arguments are JSON).
use clap::{Parser, Subcommand};
use kodirpc_core::client::TransportKind;

#[derive(Parser)]
#[command(name = "kodirpc", version, about = "Dynamic JSON-RPC CLI for Kodi")]
pub struct Cli {
    /// Transport to use (http, https, tcp, ws). Overrides the config file
    #[arg(short, long, global = true)]
    pub transport: Option<TransportKind>,

    /// Host to connect to. Overrides the config file
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to connect to. Defaults to the transport's Kodi port
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Fail on arguments or results that do not match their declared schema
    #[arg(long, global = true)]
    pub strict: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the API version the service declares
    Version,

    /// List methods, notifications or types
    List {
        #[command(subcommand)]
        sub: ListCommands,
    },

    /// Describe a method, a notification or a type in detail
    Describe {
        #[command(subcommand)]
        sub: DescribeCommands,
    },

    /// Call a remote method
    ///
    /// Arguments are positional JSON values, bound in order to the declared parameters.
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// kodirpc call JSONRPC.ping
    /// kodirpc --transport ws call Application.GetProperties '["volume", "muted"]'
    /// ```
    Call {
        /// Method (Namespace.method, either spelling)
        #[arg(value_parser = parse_method)]
        method: (String, String),

        /// Positional arguments, as JSON
        #[arg(value_parser = parse_arg)]
        args: Vec<serde_json::Value>,
    },
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// List all methods
    Methods {
        /// Group methods by namespace
        #[arg(short, long)]
        grouped: bool,
    },
    /// List all notifications
    Notifications,
    /// List all declared types
    Types,
}

#[derive(Subcommand)]
pub enum DescribeCommands {
    /// Describe a method (e.g. Player.Open)
    Method { name: String },
    /// Describe a notification (e.g. Player.OnPlay)
    Notification { name: String },
    /// Show the schema of a declared type (e.g. List.Item.Base)
    Type { name: String },
}

fn parse_method(value: &str) -> Result<(String, String), String> {
    let (namespace, method) = value.split_once('.').ok_or_else(|| {
        format!("Invalid method format: '{value}'. Expected 'Namespace.method'")
    })?;

    if namespace.trim().is_empty() || method.trim().is_empty() {
        return Err("Namespace and method names cannot be empty".to_string());
    }

    Ok((namespace.to_string(), method.to_string()))
}

/// Parses an argument as JSON, falling back to a plain string.
fn parse_arg(value: &str) -> Result<serde_json::Value, String> {
    Ok(serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_methods() {
        assert_eq!(
            parse_method("Player.getActivePlayers"),
            Ok(("Player".to_string(), "getActivePlayers".to_string()))
        );
        assert!(parse_method("Ping").is_err());
        assert!(parse_method(".Ping").is_err());
    }

    #[test]
    fn bare_words_are_strings() {
        assert_eq!(parse_arg("42"), Ok(json!(42)));
        assert_eq!(parse_arg(r#"["volume"]"#), Ok(json!(["volume"])));
        assert_eq!(parse_arg("hello"), Ok(json!("hello")));
    }

    #[test]
    fn global_flags_after_the_command() {
        let cli = Cli::try_parse_from([
            "kodirpc", "call", "Demo.echo", "hi", "--transport", "ws", "--strict",
        ])
        .unwrap();

        assert_eq!(cli.transport, Some(TransportKind::Ws));
        assert!(cli.strict);
        let Commands::Call { method, args } = cli.command else {
            panic!("expected a call");
        };
        assert_eq!(method, ("Demo".to_string(), "echo".to_string()));
        assert_eq!(args, [json!("hi")]);
    }
}
