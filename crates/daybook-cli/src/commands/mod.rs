pub mod add;
pub mod common;
pub mod completions;
pub mod daemon;
pub mod delete;
pub mod edit;
pub mod list;
pub mod net;
pub mod show;
pub mod sync;
