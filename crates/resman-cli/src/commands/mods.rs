use crate::errors::CliError;
use crate::println_pad;
use crate::utils::build_config;
use crate::EngineArgs;
use colored::Colorize;
use miette::Result;
use nwn2_resman::{CachedMetadataProvider, ResourceEngine, SteamWorkshopProvider};
use std::time::Duration;

pub struct ListModsArgs {
    pub online: bool,
}

pub fn list_mods(engine_args: &EngineArgs, args: ListModsArgs) -> Result<()> {
    let config = build_config(engine_args)?;
    let mut engine = ResourceEngine::new(config);
    if args.online {
        let provider = SteamWorkshopProvider::new().map_err(CliError::from)?;
        engine = engine.with_metadata_provider(Box::new(CachedMetadataProvider::new(
            provider,
            Duration::from_secs(3600),
            Duration::from_secs(1),
        )));
    }

    let mods = engine.list_mods();
    if mods.is_empty() {
        println_pad!("{}", "No workshop mods found".bright_yellow());
        return Ok(());
    }

    for m in mods {
        let title = m.title.as_deref().unwrap_or("(no title)");
        println_pad!(
            "{} {} {}",
            m.id.bright_cyan().bold(),
            title,
            m.override_dir.as_str().dimmed()
        );
    }
    Ok(())
}
