pub mod apk;
pub mod client;
pub mod locator;
pub mod operations;
pub mod parse;
pub mod runner;
