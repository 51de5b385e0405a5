/// Application-level constants
pub const APP_NAME: &str = "Caredraft";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Embedding dimensionality, fixed at schema definition time.
/// Stored and query embeddings must both use this length.
pub const EMBEDDING_DIM: usize = 1024;

/// Default number of evidence documents retrieved per draft.
pub const DEFAULT_TOP_K: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_name_is_caredraft() {
        assert_eq!(APP_NAME, "Caredraft");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn embedding_dimension_is_fixed() {
        assert_eq!(EMBEDDING_DIM, 1024);
    }
}
