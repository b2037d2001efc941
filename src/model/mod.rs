pub mod enums;
pub mod feature;
