pub mod batch_walker;

pub use batch_walker::{list_images, list_units, BatchWalker, IMAGE_EXTENSIONS};
