pub mod codec;
pub mod correlation;
pub mod errors;
pub mod multiplex;
pub mod registry;
pub mod serial;
pub mod session;
pub mod streams;
pub mod transport;
