pub mod org;
pub mod policy;
pub mod role;
pub mod time_entry;
