use crate::errors::CliError;
use crate::EngineArgs;
use camino::{Utf8Path, Utf8PathBuf};
use nwn2_resman::config::{INSTALL_DIR_ENV, USER_DIR_ENV};
use nwn2_resman::{ResmanConfig, ResourceEngine};

#[macro_export]
macro_rules! println_pad {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        for __line in __s.lines() {
            println!("    {}", __line);
        }
    }};
}

/// Log to stderr, filtered by `RUST_LOG` when set.
pub fn init_logging(verbose: bool) {
    let default = if verbose {
        "nwn2_resman=debug,resman=debug"
    } else {
        "nwn2_resman=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Build the engine configuration: config file first, then environment, then flags.
pub fn build_config(args: &EngineArgs) -> Result<ResmanConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => {
            let path = Utf8PathBuf::from(path);
            ResmanConfig::load(&path)?.ok_or(CliError::ConfigNotFound { path })?
        }
        None => ResmanConfig::discover().unwrap_or_default(),
    };

    if let Some(dir) = &args.install_dir {
        config.install_dir = dir.into();
    }
    if let Some(dir) = &args.user_dir {
        config.user_dir = dir.into();
    }
    for dir in &args.override_dirs {
        config.custom_override_dirs.push(dir.into());
    }
    if args.no_precompiled {
        config.precompiled_cache = false;
    }

    if config.install_dir.as_str().is_empty() {
        tracing::debug!("Neither {} nor --install-dir given", INSTALL_DIR_ENV);
        return Err(CliError::InstallUnknown);
    }
    if config.user_dir.as_str().is_empty() {
        tracing::debug!("Neither {} nor --user-dir given, user content is ignored", USER_DIR_ENV);
    }
    Ok(config)
}

/// Build and initialize an engine.
pub fn open_engine(args: &EngineArgs) -> Result<ResourceEngine, CliError> {
    Ok(ResourceEngine::open(build_config(args)?)?)
}

/// Resolve a module argument, which is either a path or a module name.
pub fn module_path(engine: &ResourceEngine, module: &str) -> Result<Utf8PathBuf, CliError> {
    let as_path = Utf8Path::new(module);
    if as_path.as_std_path().exists() {
        return Ok(as_path.to_path_buf());
    }
    engine.find_module(module).ok_or_else(|| CliError::ModuleNotFound {
        name: module.to_string(),
    })
}
