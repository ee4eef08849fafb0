pub mod instant;
pub mod record;
pub mod schema;
pub mod time_range;
pub mod value;
