//! Default value functions for serde deserialization.

pub fn translation_cap() -> f64 {
    0.1
}

pub fn rotation_cap() -> f64 {
    0.04
}

pub fn output_dir() -> String {
    "./output".to_string()
}

pub fn map_file() -> String {
    "map.ply".to_string()
}

pub fn location_file() -> String {
    "locations.txt".to_string()
}
