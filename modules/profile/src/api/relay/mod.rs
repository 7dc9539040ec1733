pub mod ws;

pub use ws::{relay_ws, OUTBOUND_EVENT};
