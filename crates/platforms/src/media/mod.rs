pub mod media_info;

pub use media_info::MediaInfo;
