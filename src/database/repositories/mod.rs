/// 存储库实现

pub mod postgres;

pub use postgres::PgStore;
