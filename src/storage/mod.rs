pub mod csv_reader;
pub mod run_file;
pub mod zone_map;

pub use csv_reader::{detect_delimiter, DelimitedReader};
pub use zone_map::{sidecar_path, ZoneMap};
