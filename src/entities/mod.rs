pub mod prelude;

pub mod news;
pub mod users;
