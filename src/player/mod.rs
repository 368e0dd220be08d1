pub mod commands;
pub mod engine;
pub mod events;
pub mod http_reader;
pub mod locator;
pub mod media;
pub mod playback;
pub mod selector;
pub mod source;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;
