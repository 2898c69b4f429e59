mod module;
mod mods;
mod precompile;
mod scan;
mod strref;
mod table;

pub use module::{show_module, ShowModuleArgs};
pub use mods::{list_mods, ListModsArgs};
pub use precompile::precompile;
pub use scan::scan_install;
pub use strref::{resolve_strrefs, StrrefArgs};
pub use table::{show_table, ShowTableArgs};
