pub mod serialization;

pub use serialization::{validate_triplets, TripletSerializer};
