pub mod category;
pub mod decoder;
pub mod feature;
pub mod record;
pub mod simplify;
pub mod wkt;
