pub mod candidates;
pub mod driver;
pub mod lsh;
pub mod minhash;
pub mod params;
pub mod verify;
