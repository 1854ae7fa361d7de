pub mod function_node;
pub mod runtime;

pub use function_node::FunctionNode;
pub use runtime::{Runtime, RuntimeState};
