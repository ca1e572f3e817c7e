mod articles;
mod highlights;
mod notes;
mod schema;
mod types;

pub use schema::Database;
pub use types::{
    ArticlePage, ArticleQuery, ArticleSort, Entity, SortField, SortOrder, StoreError,
};
