use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{module_path, open_engine};
use crate::EngineArgs;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use nwn2_resman::TwoDaTable;

pub struct ShowTableArgs {
    pub name: String,
    pub base: bool,
    pub module: Option<String>,
    pub save: Option<String>,
    pub rows: usize,
    pub json: bool,
}

pub fn show_table(engine_args: &EngineArgs, args: ShowTableArgs) -> Result<()> {
    let engine = open_engine(engine_args)?;

    if let Some(module) = &args.module {
        let path = module_path(&engine, module)?;
        engine.try_activate_module(&path).map_err(CliError::from)?;
    } else if let Some(save) = &args.save {
        let path = Utf8PathBuf::from(save);
        if !engine.load_save_context(&path) {
            return Err(CliError::SaveContext { path }.into());
        }
    }

    let table = if args.base {
        engine.get_table(&args.name)
    } else {
        engine.get_table_with_overrides(&args.name)
    }
    .ok_or_else(|| CliError::TableNotFound {
        name: args.name.clone(),
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(table.as_ref()).into_diagnostic()?);
        return Ok(());
    }

    let context = match engine.active_module() {
        Some(module) => format!("module {}", module.name),
        None if args.base => "base installation".to_string(),
        None => "global overrides".to_string(),
    };
    println_pad!(
        "{} {} {}",
        "📊 Table:".bright_blue().bold(),
        args.name.bright_cyan().bold(),
        format!("({}, {} rows)", context, table.row_count()).dimmed()
    );
    print_rows(&table, args.rows);
    if table.row_count() > args.rows {
        println_pad!("{}", format!("... {} more", table.row_count() - args.rows).dimmed());
    }

    let stats = engine.cache_stats();
    let source = if engine.precompiled_active() {
        "precompiled"
    } else {
        "scanned"
    };
    println_pad!(
        "{}",
        format!(
            "cache: {} hit(s), {} miss(es), {} entries, {} bytes, layers {}",
            stats.hits, stats.misses, stats.entries, stats.memory_bytes, source
        )
        .dimmed()
    );
    Ok(())
}

fn print_rows(table: &TwoDaTable, limit: usize) {
    let header: Vec<String> = std::iter::once("#".to_string())
        .chain(table.columns().iter().cloned())
        .collect();
    println_pad!("{}", header.join("\t").bright_yellow());

    for row in 0..table.row_count().min(limit) {
        let cells: Vec<&str> = (0..table.column_count())
            .map(|col| table.get_by_index(row, col).unwrap_or("****"))
            .collect();
        println_pad!("{}\t{}", row, cells.join("\t"));
    }
}
