pub mod messages;
pub mod prelude;
pub mod users;

/// A type alias that represents any Entity's internal id field data type.
/// Message and user ids are BIGSERIAL values, so creation order and id order
/// agree. Aliased so that it's easy to change the underlying type if necessary.
pub type Id = i64;
