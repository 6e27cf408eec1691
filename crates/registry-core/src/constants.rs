pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const VALIDATION_WINDOW_SECS: u64 = 300;
pub const REGISTRY_TAG: &str = "starRegistry";
pub const GENESIS_DATA: &str = "Genesis Block";
