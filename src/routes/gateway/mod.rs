mod handler;

pub use handler::proxy;
