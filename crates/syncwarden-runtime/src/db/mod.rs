mod local;

pub use local::LocalServer;
