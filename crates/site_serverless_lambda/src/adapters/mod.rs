pub mod clock;
pub mod object_store;
pub mod stack;
