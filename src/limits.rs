/// Largest party a single reservation may carry.
pub const MAX_PARTY_SIZE: u32 = 100;

/// Upper bound on slots a calendar may produce for one day (1-minute steps).
pub const MAX_SLOTS_PER_DAY: usize = 24 * 60;

/// Max bytes in one request line on the wire.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Max bytes in a bearer token.
pub const MAX_TOKEN_LEN: usize = 512;

/// Max accounts loaded into the directory.
pub const MAX_ACCOUNTS: usize = 100_000;
