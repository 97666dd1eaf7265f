/// Portfolio classification codes that are excluded from every migration,
/// count and update-detection query.
pub const EXCLUDED_PORTFOLIO_CLASSES: [i32; 3] = [3, 4, 5];

/// Page size for high-cardinality streaming entities (rates, logs)
pub const STREAMING_PAGE_SIZE: i64 = 1_000;

/// Page size for slowly changing reference data (securities, funds, portfolios)
pub const REFERENCE_PAGE_SIZE: i64 = 10_000;

/// Page size for companies
pub const COMPANY_PAGE_SIZE: i64 = 20_000;

/// Units of work between intermediate commits
pub const COMMIT_INTERVAL: usize = 10_000;

/// Decimal scale used by the legacy ledger columns
pub const DECIMAL_PRECISION: u32 = 6;

/// Number of natural keys fetched per gap-pass lookup
pub const KEY_CHUNK_SIZE: usize = 500;

/// Default global deadline for a run, in minutes
pub const DEFAULT_TIMEOUT_MINUTES: i64 = 30;

/// Default maximum number of orchestration iterations
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
