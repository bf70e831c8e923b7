mod buffer_op;
mod flush_op;
mod instance;
mod read_op;

pub use instance::StructInstance;
