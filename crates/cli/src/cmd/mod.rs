mod build;
mod inspect;
mod merge;

pub use build::{BuildArgs, cmd_build};
pub use inspect::cmd_inspect;
pub use merge::cmd_merge_repos;
