pub mod artifacts;
pub mod labeled_csv;

pub use artifacts::{load_object, save_object, MODEL_FILE, PREPROCESSOR_FILE};
pub use labeled_csv::{read_labeled_csv, write_labeled_csv};
