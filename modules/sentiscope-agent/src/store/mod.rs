mod postgres;

pub use postgres::PgCommentStore;
