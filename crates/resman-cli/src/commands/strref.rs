use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{module_path, open_engine};
use crate::EngineArgs;
use colored::Colorize;
use miette::Result;

pub struct StrrefArgs {
    pub refs: Vec<u32>,
    pub module: Option<String>,
}

pub fn resolve_strrefs(engine_args: &EngineArgs, args: StrrefArgs) -> Result<()> {
    let engine = open_engine(engine_args)?;
    if let Some(module) = &args.module {
        let path = module_path(&engine, module)?;
        engine.try_activate_module(&path).map_err(CliError::from)?;
    }

    for (strref, text) in engine.resolve_strings_batch(&args.refs) {
        println_pad!("{} {}", format!("{:>10}", strref).bright_cyan(), text);
    }
    Ok(())
}
