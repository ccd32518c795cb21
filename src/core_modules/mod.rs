pub mod atlas;
pub mod axis_cluster;
pub mod bounding_box;
pub mod component_detector;
pub mod frame_normalizer;
pub mod pixel;
pub mod sprite_region;
