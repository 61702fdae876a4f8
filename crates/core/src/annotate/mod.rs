pub mod frame_annotator;
pub(crate) mod glyphs;
