pub mod export;

pub use export::save_outputs;
