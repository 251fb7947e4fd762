//! Engine-wide constants.

/// Decimal places kept when persisting monetary values.
pub const DECIMAL_PRECISION: u32 = 8;

/// Quantities below this threshold are treated as zero (closed position).
pub const QUANTITY_THRESHOLD: &str = "0.00000001";

/// Date format used for snapshot date columns.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp format used for calculated_at columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
