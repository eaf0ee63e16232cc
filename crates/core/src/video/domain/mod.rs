pub mod video_source;
