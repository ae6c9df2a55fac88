mod store;

pub use store::{MongoDatabase, MongoStore};
