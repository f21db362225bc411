//! # P2P Block Messaging Test Suite
//!
//! Cross-crate tests that run whole engines against each other.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs     # Two-node link with seeded reordering, duplication and loss
//!     ├── scenarios.rs   # Ordering, widgets, transfers, connectivity
//!     └── properties.rs  # Seeded StdRng runs over shuffled/duplicated/lossy links
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pbm-tests
//! cargo test -p pbm-tests integration::properties::
//! ```

pub mod integration;
