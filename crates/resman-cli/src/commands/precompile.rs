use crate::errors::CliError;
use crate::println_pad;
use crate::utils::build_config;
use crate::EngineArgs;
use colored::Colorize;
use miette::Result;
use nwn2_resman::ResourceEngine;

pub fn precompile(engine_args: &EngineArgs) -> Result<()> {
    let config = build_config(engine_args)?.with_precompiled_cache(false);
    let cache_dir = config.cache_dir();
    let engine = ResourceEngine::open(config).map_err(CliError::from)?;

    let tables = engine.rebuild_precompiled().map_err(CliError::from)?;
    println_pad!(
        "{} {} tables written to {}",
        "✅".bright_green(),
        tables,
        cache_dir.as_str().bright_cyan()
    );
    Ok(())
}
