//! Command dispatch and handler modules.

mod fetch;
mod resolve;
mod tree;

use miette::Result;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Resolve { convergent } => resolve::exec(cli.verbose, convergent).await,
        Command::Fetch { verify } => fetch::exec(cli.verbose, verify).await,
        Command::Tree { duplicates } => tree::exec(duplicates).await,
    }
}
