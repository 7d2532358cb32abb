pub mod consts;
pub mod error;
pub mod fitter;
pub mod kernel;
pub mod model;
pub mod optimize;
pub mod types;
