pub mod access;
pub mod backend;
pub mod channel;
pub mod command;
pub mod delivery;
pub mod gateway;
pub mod logger;
pub mod processor;
pub mod run;
pub mod sequencer;
pub mod session;
pub mod settings;
pub mod store;
pub mod tools;
pub mod util;
