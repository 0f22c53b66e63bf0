pub mod events;

pub use events::{ScanEvent, ScanEventBroadcaster};
