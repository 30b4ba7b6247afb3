//! UUID7 generation: a 128-bit identifier whose high 48 bits are a
//! millisecond Unix timestamp, lexicographically ≈ temporally ordered.

use uuid::Uuid;

/// Generates a fresh UUID7, formatted as the standard 36-character string.
pub fn generate() -> String {
    Uuid::now_v7().to_string()
}
