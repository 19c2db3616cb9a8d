//! Command dispatch: bridges CLI args -> engine calls -> output formatting.

pub mod devices;
pub mod listen;
pub mod methods;
pub mod params;

use homematic_core::Ccu;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a CCU-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ccu: &Ccu, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(ccu, &args, global).await,
        Command::Methods(args) => methods::handle(ccu, &args, global).await,
        Command::Get(args) => params::get(ccu, &args, global).await,
        Command::Set(args) => params::set(ccu, &args, global).await,
        Command::Describe(args) => params::describe(ccu, &args, global).await,
        Command::Values(args) => params::values(ccu, &args, global).await,
        Command::Listen(args) => listen::handle(ccu, &args, global).await,
        Command::Completions(_) => Err(CliError::Internal(
            "completions are generated without a CCU".into(),
        )),
    }
}
