mod events;
mod main;
mod state;
mod tick;

pub use events::LinkEvent;
pub use main::{C_DATA_POLL_SENDER, C_DATA_RECEIVER, C_FIRST_INDIRECT_SENDER, LinkNode};
pub use state::LinkContext;
