use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{module_path, open_engine};
use crate::EngineArgs;
use colored::Colorize;
use miette::Result;

pub struct ShowModuleArgs {
    pub name: String,
}

pub fn show_module(engine_args: &EngineArgs, args: ShowModuleArgs) -> Result<()> {
    let engine = open_engine(engine_args)?;
    let path = module_path(&engine, &args.name)?;
    let context = engine.try_activate_module(&path).map_err(CliError::from)?;

    println_pad!(
        "{} {} {}",
        "🧭 Module:".bright_blue().bold(),
        context.name.bright_cyan().bold(),
        format!("({})", context.id).dimmed()
    );
    println_pad!("{} {}", "📁 Path:".bright_green(), context.path);
    if !context.manifest.name.is_empty() {
        println_pad!("{} {}", "🏷️ Display name:".bright_green(), context.manifest.name);
    }
    if let Some(area) = &context.manifest.entry_area {
        println_pad!("{} {}", "🚪 Entry area:".bright_green(), area);
    }
    if let Some(tlk) = context.custom_string_table_name() {
        let status = if context.custom_string_table().is_some() {
            "loaded".bright_green()
        } else {
            "missing".bright_red()
        };
        println_pad!("{} {}.tlk ({})", "💬 Custom strings:".bright_green(), tlk, status);
    }

    println_pad!("\n{}", "🧩 Dependent containers (load order):".bright_magenta().bold());
    for container in &context.containers {
        println_pad!("   {} {}", "•".bright_cyan(), container);
    }
    for missing in &context.missing_containers {
        println_pad!("   {} {}.hak {}", "•".bright_red(), missing, "(missing)".bright_red());
    }

    let campaign = context
        .campaign
        .clone()
        .or_else(|| engine.find_campaign(&path));
    if let Some(campaign) = campaign {
        println_pad!(
            "\n{} {} {}",
            "🗺️  Campaign:".bright_magenta().bold(),
            campaign.name.bright_cyan(),
            format!("({})", campaign.id).dimmed()
        );
        println_pad!("   {}", campaign.directory.as_str().dimmed());
        if let Some(start) = &campaign.start_module {
            println_pad!("   start module: {}", start);
        }
    }
    Ok(())
}
