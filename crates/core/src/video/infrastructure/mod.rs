pub mod image_file_source;
