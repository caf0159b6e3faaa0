pub const APP_NAME: &str = "distpack";

/// Top-level shared library directory of a distribution tree.
pub const LIB_DIR: &str = "lib";

/// Directory holding one sub-directory per bundled plugin.
pub const PLUGINS_DIR: &str = "plugins";

pub const ARCHIVE_EXTENSION: &str = "jar";

/// Presence of this file in a module output marks the module as a plugin.
pub const PLUGIN_DESCRIPTOR: &str = "META-INF/plugin.xml";

/// Marker resource signalling that a module cannot be merged with other content.
pub const PACKAGING_CONFLICT_MARKER: &str = "META-INF/packaging-conflict";

/// Directory name used for the client/frontend variant inside a distribution.
pub const DEFAULT_FRONTEND_DIR: &str = "frontend";

pub const DEFAULT_MAIN_ARCHIVE: &str = "app.jar";
pub const DEFAULT_LIBRARY_ARCHIVE: &str = "3rd-party.jar";

pub const AUTO_INFERRED_REASON: &str = "auto-inferred";

/// File extensions treated as platform-specific binaries inside archives.
pub const NATIVE_EXTENSIONS: &[&str] = &["so", "dylib", "jnilib", "dll", "exe"];

pub const CACHE_METADATA_FILENAME: &str = "metadata.json";
pub const CACHE_METADATA_VERSION: u32 = 1;

pub const REPOSITORY_FORMAT_VERSION: u32 = 1;
pub const MODULE_REPOSITORY_FILENAME: &str = "module-descriptors.json";

pub const CONTENT_MAPPING_FILENAME: &str = "content-mapping.json";
pub const CONTENT_REPORT_FILENAME: &str = "content.json";
pub const THIRD_PARTY_LIBRARIES_FILENAME: &str = "third-party-libraries.json";

/// Build options file looked up next to the project model.
pub const CONFIG_FILENAME: &str = "distpack.toml";
pub const CACHE_DIR_ENV: &str = "DISTPACK_CACHE_DIR";
pub const PARALLELISM_ENV: &str = "DISTPACK_PARALLELISM";
