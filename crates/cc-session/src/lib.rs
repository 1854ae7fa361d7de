pub mod manager;
pub mod session;
pub mod transport;

pub use manager::Manager;
pub use session::handle_session;
pub use transport::{ClientSink, ClientSource, ClientTransport};
