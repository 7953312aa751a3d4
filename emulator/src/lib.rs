pub mod constants;
pub mod loader;
pub mod runtime;

pub use self::runtime::Computer;
