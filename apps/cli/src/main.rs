//! Folio CLI: build e-books from declarative JSON specs.
//!
//! Each spec lists chapters, the filter chain that prepares them, and the
//! output filters that package the finished book.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

// Filter futures hold parsed documents and are not `Send`; one thread runs them all.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
