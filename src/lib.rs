pub mod checkpoint;
pub mod collaborators;
pub mod config;
pub mod errors;
pub mod gates;
pub mod logging;
pub mod pilot_config;
pub mod pipeline;
pub mod session;
pub mod ui;
pub mod util;
