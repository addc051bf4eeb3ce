//! Rigging CLI - resolve kubeconfigs and group-vars for inventory entries

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rigging_core::SecretContext;
use rigging_core::context::DEFAULT_KEY_DIR;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod commands;
mod error;
mod exit_codes;

/// Environment variable holding the log filter
const LOG_ENV: &str = "RIGGING_LOG";

#[derive(Parser)]
#[command(name = "rigging")]
#[command(author = "Rigging Contributors")]
#[command(version)]
#[command(about = "Resolve kubeconfigs and group-vars for inventory entries", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the values for the given groups
    ///
    /// Groups are ordered from least to most specific; values of later
    /// groups override values of earlier ones.
    Compile {
        /// Groups to merge, lowest priority first
        #[arg(required = true, value_name = "GROUP")]
        groups: Vec<String>,

        #[command(flatten)]
        group_vars: GroupVarsArgs,

        #[command(flatten)]
        secrets: SecretArgs,

        /// Output JSON instead of YAML
        #[arg(short, long)]
        json: bool,

        /// Compile without printing the result
        #[arg(short, long)]
        quiet: bool,
    },

    /// Inspect the inventory
    Inventory {
        #[command(subcommand)]
        command: InventoryCommands,
    },

    /// Resolve a playbook for every matching inventory entry
    Playbook {
        /// Playbook file
        file: PathBuf,

        #[command(flatten)]
        inventory: InventoryArgs,

        /// Regular expression selecting entries (matched against whole names)
        #[arg(short, long, default_value = ".*")]
        filter: String,

        #[command(flatten)]
        group_vars: GroupVarsArgs,
    },
}

#[derive(Subcommand)]
enum InventoryCommands {
    /// List entry names
    List {
        #[command(flatten)]
        inventory: InventoryArgs,

        /// Regular expression selecting entries (matched against whole names)
        #[arg(short, long, default_value = ".*")]
        filter: String,

        /// Show loader type and groups
        #[arg(short, long)]
        long: bool,
    },

    /// Print the kubeconfig of an entry
    Kubeconfig {
        /// Entry name
        entry: String,

        #[command(flatten)]
        inventory: InventoryArgs,
    },

    /// Compile the values of an entry's groups
    Values {
        /// Entry name
        entry: String,

        #[command(flatten)]
        inventory: InventoryArgs,

        #[command(flatten)]
        group_vars: GroupVarsArgs,

        /// Output JSON instead of YAML
        #[arg(short, long)]
        json: bool,
    },
}

/// EJSON decryption settings
#[derive(Args, Clone)]
struct SecretArgs {
    /// EJSON private key
    #[arg(short = 'k', long, env = "EJSON_PRIVKEY", hide_env_values = true)]
    ejson_privkey: Option<String>,

    /// Directory containing EJSON keys
    #[arg(long, env = "EJSON_KEYDIR", default_value = DEFAULT_KEY_DIR)]
    ejson_key_dir: PathBuf,

    /// Skip EJSON decryption
    #[arg(long)]
    skip_decrypt: bool,
}

impl SecretArgs {
    fn context(&self) -> SecretContext {
        SecretContext::new(&self.ejson_key_dir, self.ejson_privkey.clone())
            .skip_decrypt(self.skip_decrypt)
    }
}

#[derive(Args, Clone)]
struct InventoryArgs {
    /// Inventory file
    #[arg(short, long, default_value = "inventory.yaml")]
    inventory: PathBuf,

    #[command(flatten)]
    secrets: SecretArgs,
}

#[derive(Args, Clone)]
struct GroupVarsArgs {
    /// Source directory to read group-vars from
    #[arg(short = 'd', long, default_value = "group_vars")]
    group_vars_dir: PathBuf,

    /// Skip template evaluation
    #[arg(long)]
    skip_eval: bool,
}

/// Install the tracing subscriber, writing to stderr
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("rigging=warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_logging(cli.debug);

    let result = match cli.command {
        Commands::Compile {
            groups,
            group_vars,
            secrets,
            json,
            quiet,
        } => commands::compile::run(
            &groups,
            &group_vars.group_vars_dir,
            &secrets.context(),
            group_vars.skip_eval,
            json,
            quiet,
        ),

        Commands::Inventory { command } => match command {
            InventoryCommands::List {
                inventory,
                filter,
                long,
            } => commands::inventory::list(
                &inventory.inventory,
                &inventory.secrets.context(),
                &filter,
                long,
            ),

            InventoryCommands::Kubeconfig { entry, inventory } => {
                commands::inventory::kubeconfig(
                    &inventory.inventory,
                    &inventory.secrets.context(),
                    &entry,
                )
                .await
            }

            InventoryCommands::Values {
                entry,
                inventory,
                group_vars,
                json,
            } => commands::inventory::values(
                &inventory.inventory,
                &inventory.secrets.context(),
                &entry,
                &group_vars.group_vars_dir,
                group_vars.skip_eval,
                json,
            ),
        },

        Commands::Playbook {
            file,
            inventory,
            filter,
            group_vars,
        } => commands::playbook::run(
            &file,
            &inventory.inventory,
            &inventory.secrets.context(),
            &filter,
            &group_vars.group_vars_dir,
            group_vars.skip_eval,
        ),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
