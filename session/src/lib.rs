pub mod allocator;
pub mod model;
pub mod registry;
pub mod set;
pub mod store;
pub mod timing;
