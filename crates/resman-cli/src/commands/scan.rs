use crate::println_pad;
use crate::utils::build_config;
use crate::EngineArgs;
use colored::Colorize;
use miette::Result;
use nwn2_resman::ResourceEngine;

pub fn scan_install(args: &EngineArgs) -> Result<()> {
    let config = build_config(args)?;
    let engine = ResourceEngine::new(config);
    let report = engine.initialize().map_err(crate::errors::CliError::from)?;

    println_pad!(
        "{} {}",
        "🎮 Installation:".bright_blue().bold(),
        engine.config().install_dir.as_str().bright_cyan()
    );
    println_pad!(
        "{} {} archive(s), fingerprint {}",
        "📦 Base:".bright_green(),
        report.base_archives,
        format!("{:016x}", report.fingerprint).dimmed()
    );
    if report.precompiled_hit {
        println_pad!(
            "{} precompiled cache is current, full scan skipped",
            "⚡".bright_yellow()
        );
    }
    if !report.base_strings {
        println_pad!("{} base string table missing", "⚠".bright_red());
    }

    println_pad!("\n{}", "🏗️  Layers (highest first):".bright_magenta().bold());
    for layer in engine.layer_summary() {
        println_pad!(
            "   {} {} {}",
            "•".bright_cyan(),
            layer.kind.label().bright_cyan().bold(),
            format!("({} source(s), {} resources)", layer.sources.len(), layer.resources).dimmed()
        );
        for source in &layer.sources {
            println_pad!("       {}", source.as_str().dimmed());
        }
    }

    println_pad!("\n{} {} ms", "⏱️  Done in".bright_green(), report.elapsed_ms);
    Ok(())
}
