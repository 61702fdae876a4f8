pub mod annotate;
pub mod codec;
pub mod detection;
pub mod measure;
pub mod shared;
