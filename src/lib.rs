pub mod batch;
pub mod classifier;
pub mod config;
pub mod descriptor;
pub mod detector;
pub mod error;
pub mod feature;
pub mod frame;
pub mod image;
pub mod math;
pub mod my_types;
pub mod optical_flow;
pub mod pyramid;
pub mod store;
pub mod tracker;
pub mod video;
pub mod visualization;

#[cfg(test)]
mod test_utils;
