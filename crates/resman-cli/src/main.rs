use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{Args as ClapArgs, CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    list_mods, precompile, resolve_strrefs, scan_install, show_module, show_table, ListModsArgs,
    ShowModuleArgs, ShowTableArgs, StrrefArgs,
};
use miette::Result;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    engine: EngineArgs,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that builds an engine.
#[derive(ClapArgs, Debug, Clone)]
pub struct EngineArgs {
    /// Path to a resman.toml configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Game installation directory (overrides the config file and NWN2_INSTALL_DIR)
    #[arg(long, global = true)]
    pub install_dir: Option<String>,

    /// User content directory (overrides the config file and NWN2_USER_DIR)
    #[arg(long, global = true)]
    pub user_dir: Option<String>,

    /// Extra override directory, may be repeated
    #[arg(long = "override-dir", global = true)]
    pub override_dirs: Vec<String>,

    /// Ignore and do not write the precompiled cache
    #[arg(long, global = true)]
    pub no_precompiled: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the installation and show the override layers
    Scan,
    /// Look up a table
    Table {
        /// Table name, with or without the .2da extension
        name: String,

        /// Ignore every override and read the base installation only
        #[arg(long)]
        base: bool,

        /// Resolve as seen by this module (path or name)
        #[arg(short, long)]
        module: Option<String>,

        /// Resolve as seen by the module of this save folder
        #[arg(short, long, conflicts_with = "module")]
        save: Option<String>,

        /// Maximum number of rows to print
        #[arg(long, default_value_t = 20)]
        rows: usize,

        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve string references
    Strref {
        /// String references to resolve
        #[arg(required = true)]
        refs: Vec<u32>,

        /// Use the custom string table of this module (path or name)
        #[arg(short, long)]
        module: Option<String>,
    },
    /// Show a module, its dependent containers and its campaign
    Module {
        /// Module path or name
        name: String,
    },
    /// List installed workshop mods
    Mods {
        /// Fetch titles from the Steam Workshop
        #[arg(long)]
        online: bool,
    },
    /// Rebuild the precompiled cache
    Precompile,
}

fn parse_args() -> Args {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    }
}

fn main() -> Result<()> {
    let args = parse_args();
    utils::init_logging(args.verbose);

    match args.command {
        Commands::Scan => scan_install(&args.engine),
        Commands::Table {
            name,
            base,
            module,
            save,
            rows,
            json,
        } => show_table(
            &args.engine,
            ShowTableArgs {
                name,
                base,
                module,
                save,
                rows,
                json,
            },
        ),
        Commands::Strref { refs, module } => {
            resolve_strrefs(&args.engine, StrrefArgs { refs, module })
        }
        Commands::Module { name } => show_module(&args.engine, ShowModuleArgs { name }),
        Commands::Mods { online } => list_mods(&args.engine, ListModsArgs { online }),
        Commands::Precompile => precompile(&args.engine),
    }
}
