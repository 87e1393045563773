pub mod builder;
pub mod config;
pub mod error;
pub mod exec;
pub mod fixtures;
pub mod host;
pub mod matcher;
pub mod ops;
pub mod render;
pub mod rewrite;
pub mod syntax;
pub mod tree;
