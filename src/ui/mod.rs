pub mod icons;
pub mod progress;

pub use progress::{SessionUI, print_checkpoint, print_outcome, print_record, print_sessions};
