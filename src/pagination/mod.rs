//! Client-side cursor pagination

mod adapter;
mod page;
mod view;

pub use adapter::{FetchOutcome, InitOutcome, PageView, PaginatorAdapter};
pub use page::{is_last_page, Page, PageCursor};
pub use view::{Direction, PaginatedData};
