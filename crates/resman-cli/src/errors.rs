use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(config::not_found),
        help("Pass an existing resman.toml with --config, or omit the flag to use the environment")
    )]
    ConfigNotFound { path: Utf8PathBuf },

    #[error("Game installation directory unknown")]
    #[diagnostic(
        code(config::install_unknown),
        help("Pass --install-dir, set NWN2_INSTALL_DIR, or set install_dir in resman.toml")
    )]
    InstallUnknown,

    #[error("Table not found: {name}")]
    #[diagnostic(
        code(table::not_found),
        help("No layer provides this table. Run 'resman scan' to see which sources are indexed")
    )]
    TableNotFound { name: String },

    #[error("Module not found: {name}")]
    #[diagnostic(
        code(module::not_found),
        help("Pass a path to a .mod file or module folder, or a module name from the modules directories")
    )]
    ModuleNotFound { name: String },

    #[error("Save folder has no usable module: {path}")]
    #[diagnostic(
        code(module::save_context),
        help("The save folder must contain currentmodule.txt naming an installed module")
    )]
    SaveContext { path: Utf8PathBuf },

    #[error(transparent)]
    #[diagnostic(code(engine::error))]
    Engine(#[from] nwn2_resman::Error),
}
