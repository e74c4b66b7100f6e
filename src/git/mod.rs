mod repo;

pub use repo::{is_remote_location, CommitWalk, GitRepo};
