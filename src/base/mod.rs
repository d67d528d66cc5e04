mod compress;
mod file;
mod generation;
mod numerical;
mod singleton_instance;
mod string;
mod temp_file;

pub use compress::compress_buffer;
pub use compress::compress_file;
pub use compress::decompress_buffer;
pub use file::format_wal_segment_name;
pub use file::generation_dir;
pub use file::generation_name_path;
pub use file::generations_dir;
pub use file::meta_path;
pub use file::parse_snapshot_path;
pub use file::parse_wal_segment_name;
pub use file::parse_wal_segment_path;
pub use file::path_base;
pub use file::remote_generation_dir;
pub use file::remote_generations_dir;
pub use file::shadow_wal_dir;
pub use file::shadow_wal_path;
pub use file::snapshot_file;
pub use file::snapshots_dir;
pub use file::wal_path;
pub use file::walsegment_file;
pub use file::walsegments_dir;
pub use generation::Generation;
pub use numerical::is_power_of_two;
pub use singleton_instance::GlobalInstance;
pub use string::mask_string;
pub use temp_file::atomic_write;
