pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod domain;
pub mod error;
pub mod normalize;
pub mod output;
pub mod selector;
pub mod sync;
pub mod worker;
