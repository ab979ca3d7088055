// # Shared State
//
// In-memory state shared between the engine's periodic tasks.

pub mod current_address;

pub use current_address::CurrentAddress;
