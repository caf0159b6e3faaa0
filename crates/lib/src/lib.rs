//! distpack-lib: layout resolution and archive packaging for modular distributions
//!
//! The engine turns a compiled project model and a set of declarative layouts
//! into a distribution tree:
//! - `resolve`: implicit module closure and library pack modes
//! - `assets`: target files with ordered content sources
//! - `archive`: content-addressed, cached, concurrent archive building
//! - `entries`: provenance records of what went into every file
//! - `repo`: the runtime module repository, one canonical path per module

pub mod archive;
pub mod assets;
pub mod checks;
pub mod config;
pub mod consts;
pub mod context;
pub mod diagnostics;
pub mod entries;
pub mod layout;
pub mod model;
pub mod pipeline;
pub mod repo;
pub mod resolve;
pub mod util;
