pub mod footer;
pub mod header;
pub mod utils;

pub use footer::draw_footer;
pub use header::{draw_header, draw_tabs};
pub use utils::{format_amount, task_status_color, truncate};
