//! Command-line interface for rowmap
//!
//! Every command runs inside a transaction that is committed on success, or
//! rolled back with `--dry-run`. Rows are printed as pretty JSON objects.
//!
//! ```bash
//! rowmap first "SELECT * FROM users ORDER BY id" --or-default
//! rowmap version --connection-string "host=localhost user=postgres"
//! ```

use clap::{Parser, Subcommand};
use rowmap::{
    connect, execute, execute_scalar, fetch, first_row, query_dynamic, server_version,
    single_row, CommandOptions, ConnectionOpts, QueryError,
};
use rowmap_core::{DynamicBag, Mapper, Value};
use tokio_postgres::Transaction;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "rowmap")]
#[command(about = "Map PostgreSQL query results onto JSON records")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every row of a query
    Query {
        #[command(flatten)]
        args: CommandArgs,
    },

    /// Print the first row of a query
    First {
        #[command(flatten)]
        args: CommandArgs,

        /// Print null instead of failing when there are no rows
        #[arg(long)]
        or_default: bool,
    },

    /// Print the only row of a query
    Single {
        #[command(flatten)]
        args: CommandArgs,

        /// Print null instead of failing unless there is exactly one row
        #[arg(long)]
        or_default: bool,
    },

    /// Print the first column of the first row
    Scalar {
        #[command(flatten)]
        args: CommandArgs,
    },

    /// Run a command and print the number of affected rows
    Execute {
        #[command(flatten)]
        args: CommandArgs,
    },

    /// Print the server version
    Version {
        #[command(flatten)]
        connection: ConnectionOpts,
    },
}

#[derive(clap::Args)]
struct CommandArgs {
    /// SQL text with $1, $2, ... placeholders
    sql: String,

    /// Positional parameter, converted to the placeholder's type (repeatable)
    #[arg(long = "param", value_name = "VALUE")]
    params: Vec<String>,

    #[command(flatten)]
    connection: ConnectionOpts,
}

impl CommandArgs {
    fn values(&self) -> Vec<Value> {
        self.params.iter().map(|p| Value::from(p.as_str())).collect()
    }
}

impl Commands {
    fn connection(&self) -> &ConnectionOpts {
        match self {
            Commands::Query { args }
            | Commands::First { args, .. }
            | Commands::Single { args, .. }
            | Commands::Scalar { args }
            | Commands::Execute { args } => &args.connection,
            Commands::Version { connection } => connection,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let connection = cli.command.connection();
    let options = connection.command_options()?;

    let mut client = connect(&connection.connection_string).await?;
    let transaction = client.transaction().await?;

    let mapper = Mapper::new();
    let result = run_command(&cli.command, &transaction, &mapper, &options).await;
    let value = match result {
        Ok(value) => value,
        Err(e) => return Err(command_failure(e, transaction.rollback().await)),
    };

    if connection.dry_run {
        transaction.rollback().await?;
        info!("Dry run: transaction rolled back");
    } else {
        transaction.commit().await?;
        info!("Transaction committed");
    }

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn run_command(
    command: &Commands,
    transaction: &Transaction<'_>,
    mapper: &Mapper,
    options: &CommandOptions,
) -> Result<Value, QueryError> {
    match command {
        Commands::Query { args } => {
            let bags =
                query_dynamic(transaction, mapper, &args.sql, args.values(), options).await?;
            Ok(Value::Array(bags.into_iter().map(Value::Map).collect()))
        }
        Commands::First { args, or_default } => {
            let rows = fetch(transaction, &args.sql, args.values(), options).await?;
            let bag = match first_row(rows)? {
                Some(row) => Some(mapper.create_dynamic(&row)?),
                None => None,
            };
            or_null(bag, *or_default, QueryError::EmptyResultSet)
        }
        Commands::Single { args, or_default } => {
            let rows = fetch(transaction, &args.sql, args.values(), options).await?;
            let bag = match single_row(rows)? {
                Some(row) => Some(mapper.create_dynamic(&row)?),
                None => None,
            };
            or_null(bag, *or_default, QueryError::NotSingle)
        }
        Commands::Scalar { args } => {
            let value = execute_scalar(transaction, &args.sql, args.values(), options).await?;
            Ok(value.unwrap_or(Value::Null))
        }
        Commands::Execute { args } => {
            let affected = execute(transaction, &args.sql, args.values(), options).await?;
            Ok(Value::from(affected))
        }
        Commands::Version { .. } => {
            let version = server_version(transaction, options).await?;
            info!(version = %version, "Connected");
            Ok(Value::from(version))
        }
    }
}

/// The error to report for a failed command. A rollback failure is logged
/// and never replaces the command's own error.
fn command_failure<E: std::fmt::Display>(
    error: QueryError,
    rollback: Result<(), E>,
) -> anyhow::Error {
    if let Err(rollback_error) = rollback {
        error!("Rollback after failed command also failed: {rollback_error}");
    }
    error.into()
}

fn or_null(
    bag: Option<DynamicBag>,
    or_default: bool,
    missing: QueryError,
) -> Result<Value, QueryError> {
    match bag {
        Some(bag) => Ok(Value::Map(bag)),
        None if or_default => Ok(Value::Null),
        None => Err(missing),
    }
}
