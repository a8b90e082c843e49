pub mod viewer;

pub use viewer::viewer;
