//! Layered resource resolution and caching for Neverwinter Nights 2 save editing.
//!
//! A save editor needs rule tables (`classes.2da`, `feat.2da`, ...) and localized
//! strings exactly as the game would see them for the module a save belongs to.
//! This crate resolves every lookup through six ranked layers, highest first:
//!
//! - **Module own**: the active module's resources (and its campaign folder)
//! - **Dependent containers**: the module's haks, the last loaded winning
//! - **Custom override**: directories added at runtime or in configuration
//! - **Workshop**: workshop mod folders
//! - **Override**: the user's `override/` directory
//! - **Base**: the installation's `Data/*.zip` archives
//!
//! It supports:
//!
//! - **Context-isolated caching**: parsed tables are cached per module context
//! - **Invalidation**: loose override files are re-read when they change on disk
//! - **Precompiled cache**: parsed tables persisted across runs, validated by a
//!   fingerprint of the installed content
//! - **Module contexts**: a small LRU of activated modules with their haks and
//!   custom string tables
//!
//! # Example
//!
//! ```no_run
//! use nwn2_resman::{ResmanConfig, ResourceEngine};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ResmanConfig::new("C:/Games/NWN2", "C:/Users/me/Documents/Neverwinter Nights 2");
//! let engine = ResourceEngine::open(config)?;
//!
//! if let Some(classes) = engine.get_table_with_overrides("classes") {
//!     println!("{} classes", classes.row_count());
//! }
//! println!("{}", engine.resolve_string(5));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod invalidation;
pub mod layers;
pub mod location;
pub mod locator;
pub mod module;
pub mod precompiled;
pub mod resolver;
pub mod strings;
pub mod utils;
pub mod workshop;

// Re-export main types
pub use cache::{CacheKey, CacheScope, CacheStats, ResourceCache};
pub use codec::{Codecs, ContainerCodec, ManifestCodec, StringTable, StringTableCodec, TableCodec};
pub use config::ResmanConfig;
pub use engine::{ResourceEngine, StartupReport};
pub use error::{Error, Result};
pub use layers::{LayerKind, LayerStack, LayerSummary};
pub use location::{ResourceLocation, SourceKind};
pub use module::{CampaignInfo, ModuleContext, ModuleContextManager, ModuleManifest};
pub use nwn2_formats::TwoDaTable;
pub use workshop::{
    CachedMetadataProvider, MetadataProvider, RemoteModInfo, SteamWorkshopProvider, WorkshopMod,
};
