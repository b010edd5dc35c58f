pub mod data;
pub mod io;

pub use data::{Config, Credentials, GeolocationConfig};
pub use io::ConfigError;
