pub mod academic;
pub mod attendance;
pub mod catalog;
pub mod notification;
pub mod people;

pub use academic::*;
pub use attendance::*;
pub use catalog::*;
pub use notification::*;
pub use people::*;
