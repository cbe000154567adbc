mod checksum;
mod fetch;
mod merge_list;

pub use checksum::run_checksum;
pub use fetch::run_fetch;
pub use merge_list::run_merge_list;
