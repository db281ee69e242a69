//! Persisted models.

mod guild;
mod session;

pub use guild::GuildRecord;
pub use session::Session;

pub(crate) use guild::GuildRow;
pub(crate) use session::SessionRow;
