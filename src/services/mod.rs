pub mod hierarchy;
pub mod matching;
pub mod normalize;
pub mod sync;
pub mod track_loader;
