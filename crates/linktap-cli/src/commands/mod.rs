pub mod streams;
pub mod sync;
