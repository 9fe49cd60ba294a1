pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{column, database, empty, error, header, point, success, violations};
pub use table::DataPointTable;
pub use theme::{theme, Theme};
