//! Library side of the settle CLI: config file handling and the stdin
//! debounce host

pub mod event;
pub mod host;
pub mod system_config;
