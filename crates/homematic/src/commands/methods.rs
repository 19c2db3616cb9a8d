//! Interface introspection.

use homematic_core::Ccu;
use tabled::Tabled;

use crate::cli::{GlobalOpts, MethodsArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct MethodRow {
    #[tabled(rename = "Method")]
    name: String,
}

pub async fn handle(ccu: &Ccu, args: &MethodsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut methods = ccu.list_methods(&args.interface).await?;
    methods.sort();

    let out = output::render_list(
        &global.output,
        &methods,
        |m| MethodRow { name: m.clone() },
        String::clone,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
