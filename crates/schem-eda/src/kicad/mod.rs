pub mod cache;
pub mod defaults;
pub mod discovery;
pub mod symbol;
pub mod symbol_library;
