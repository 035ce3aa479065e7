pub mod block;
pub mod error;
pub mod extensions;
pub mod frame;
pub mod input;
pub mod json;
pub mod procedures;
pub mod project;
pub mod target;
pub mod thread;
pub mod utility;
pub mod value;
