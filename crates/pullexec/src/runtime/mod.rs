pub mod mem_tracker;
pub mod profile;
pub mod state;
