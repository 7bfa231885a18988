mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use kernscope_store::{Collection, SqliteDocumentStore};

#[derive(Parser)]
#[command(
    name = "kernscope",
    version,
    about = "Regression, bisection and delta analysis over kernel CI results"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Path to the document database
    #[arg(long, default_value = "kernscope.db", global = true)]
    store: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Import result documents from a JSON file into a collection
    Import {
        /// Target collection (e.g. boot_results, build_results)
        collection: Collection,
        /// Path to a JSON document or array of documents
        file: PathBuf,
    },
    /// Index a failing result into its lane's regression history
    Regression {
        /// Id of the boot result to index
        result_id: String,
    },
    /// Bisect a failing result against its lane's history
    Bisect {
        /// Id of the failing result
        result_id: String,
        /// Bisect a build result instead of a boot result
        #[arg(long)]
        build: bool,
        /// Compare against another tree instead of bisecting
        #[arg(long)]
        compare_to: Option<String>,
    },
    /// Compute a delta from a JSON request file
    Delta {
        /// Path to a JSON delta request
        request: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    let store = SqliteDocumentStore::open(&cli.store)?;

    match cli.command {
        Commands::Import { collection, file } => {
            commands::import::execute(&store, collection, &file)
        }
        Commands::Regression { result_id } => commands::regression::execute(&store, &result_id),
        Commands::Bisect {
            result_id,
            build,
            compare_to,
        } => commands::bisect::execute(&store, &result_id, build, compare_to.as_deref()),
        Commands::Delta { request } => commands::delta::execute(&store, &request),
    }
}
