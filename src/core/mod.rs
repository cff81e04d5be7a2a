pub mod series_manager;
pub mod session;
pub mod utils;

pub use series_manager::{CorrectionReport, EditOutcome, SeriesManager};
pub use session::{Clock, FixedClock, SessionContext, SystemClock};
