pub mod collection;
pub mod record;

// Re-export handler functions for use in routing
pub use collection::create;
pub use collection::list;

pub use record::delete;
pub use record::get;
pub use record::update;
