mod earn;
mod home;
mod wallet;

pub use earn::draw_task_list;
pub use home::draw_home;
pub use wallet::draw_wallet;
