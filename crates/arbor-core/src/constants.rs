//! Protocol constants. All monetary values in motes (1 ARB = 10^8 motes).

pub const COIN: u64 = 100_000_000;

/// Default retention horizon: how far below the best tip a branch may still
/// be extended.
///
/// # Examples
///
/// ```
/// use arbor_core::constants::DEFAULT_CUT_OFF_AGE;
/// assert_eq!(DEFAULT_CUT_OFF_AGE, 10);
/// ```
pub const DEFAULT_CUT_OFF_AGE: u64 = 10;

/// Height assigned to the genesis node.
pub const GENESIS_HEIGHT: u64 = 1;

/// Current transaction and block version.
pub const PROTOCOL_VERSION: u64 = 1;

/// Default depth of the node's block ingest queue.
pub const DEFAULT_INGEST_QUEUE_DEPTH: usize = 1024;
