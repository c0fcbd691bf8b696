mod dispatcher;
mod table;

pub use dispatcher::Dispatcher;
pub use table::CommandTable;
