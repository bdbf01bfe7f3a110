//! # Kodirpc CLI Entry Point
//!
//! The main executable for the Kodirpc tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and sets up logging.
//! 2. **Configuration**: Loads the default client options and applies the command-line overrides.
//! 3. **Execution**: Delegates the request processing to the `KodiClient`.
//! 4. **Presentation**: Formats and prints the resulting data or error to standard output/error.
mod cli;
mod config;
mod formatter;

use clap::Parser;
use cli::{Cli, Commands, DescribeCommands, ListCommands};
use config::ConfigManager;
use formatter::{
    FormattedString, GenericError, GroupedMethods, MethodView, NameList, NotificationView,
    TypeView,
};
use kodirpc_core::client::{CallError, ClientOptions, KodiClient};
use std::process;
use tracing::{Level, debug};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    init_tracing(args.debug);

    let options = match client_options(&args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{}", FormattedString::from(GenericError("Configuration Error", err)));
            process::exit(1);
        }
    };

    let client = match KodiClient::new(options) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{}", FormattedString::from(err));
            process::exit(1);
        }
    };

    let outcome = run(&client, args.command).await;

    client.disconnect().await;

    match outcome {
        Ok(output) => println!("{output}"),
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::WARN };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Config file defaults, overridden by the command line.
fn client_options(args: &Cli) -> anyhow::Result<ClientOptions> {
    let manager = ConfigManager::new()?;
    debug!(path = %manager.path().display(), "loading configuration");

    let mut options = manager.load()?.client;

    if let Some(transport) = args.transport {
        // A port from the config file belongs to the configured transport.
        if transport != options.transport {
            options.connection.port = None;
        }
        options.transport = transport;
    }
    if let Some(host) = &args.host {
        options.connection.host = host.clone();
    }
    if let Some(port) = args.port {
        options.connection.port = Some(port);
    }
    if args.strict {
        options.throw_validation_error = true;
    }

    Ok(options)
}

async fn run(client: &KodiClient, command: Commands) -> Result<FormattedString, FormattedString> {
    match command {
        Commands::Version => {
            let cache = client.introspection().await?;
            Ok(FormattedString(cache.version().to_string()))
        }
        Commands::List { sub } => {
            let cache = client.introspection().await?;
            Ok(match sub {
                ListCommands::Methods { grouped: true } => {
                    FormattedString::from(GroupedMethods(cache.list_methods_grouped().clone()))
                }
                ListCommands::Methods { grouped: false } => {
                    FormattedString::from(NameList("Available Methods", cache.list_methods()))
                }
                ListCommands::Notifications => {
                    FormattedString::from(NameList("Available Notifications", cache.list_notifications()))
                }
                ListCommands::Types => FormattedString::from(NameList("Declared Types", cache.list_types())),
            })
        }
        Commands::Describe { sub } => {
            let cache = client.introspection().await?;
            match sub {
                DescribeCommands::Method { name } => cache
                    .describe_method(&name)
                    .map(|method| FormattedString::from(MethodView(&name, method)))
                    .ok_or_else(|| not_found("Method", &name)),
                DescribeCommands::Notification { name } => cache
                    .describe_notification(&name)
                    .map(|notification| FormattedString::from(NotificationView(&name, notification)))
                    .ok_or_else(|| not_found("Notification", &name)),
                DescribeCommands::Type { name } => cache
                    .describe_type(&name)
                    .map(|schema| FormattedString::from(TypeView(&name, schema)))
                    .ok_or_else(|| not_found("Type", &name)),
            }
        }
        Commands::Call {
            method: (namespace, method),
            args,
        } => {
            let callable = client
                .namespace(&namespace)
                .and_then(|handle| handle.method(&method))
                .ok_or_else(|| {
                    FormattedString::from(CallError::UnknownMethod(format!("{namespace}.{method}")))
                })?;

            let result = callable.call(args).await?;
            Ok(FormattedString::from(result))
        }
    }
}

fn not_found(kind: &'static str, name: &str) -> FormattedString {
    FormattedString::from(GenericError(
        "Symbol Lookup Failed",
        format!("{kind} '{name}' is not declared by the service"),
    ))
}
