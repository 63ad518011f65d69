//! Core data types for the armor-extractor crate.
//!
//! This module defines the fundamental types used throughout the crate:
//! - `Rect`: Screen-space bounds of a UI element
//! - `PgpNode`: A locally owned copy of a node that holds an armored message
//! - `ArmorError`: Errors raised while rebuilding an armored message
//! - `generate_fingerprint`: SHA-256 fingerprint used to correlate log lines

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Screen-space rectangle of a UI element, in pixels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Returns `true` if the rectangle covers no area.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// A node matched by the locator.
///
/// Everything the later stages need is copied out of the platform tree, so a
/// `PgpNode` stays valid after the tree it came from has gone stale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PgpNode {
    /// Class name of the matched node (e.g. "android.view.View")
    pub class_name: String,

    /// The content description, starting with the armor header marker
    pub text: String,

    /// Bounds of the node on screen, used to anchor the overlay
    pub bounds: Rect,
}

/// Errors that can occur while rebuilding an armored message.
///
/// Both variants are terminal for one node only: the caller skips the node and
/// keeps handling the others.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArmorError {
    /// The text never contained the base64 payload start (wrong node, or empty text)
    #[error("No payload marker: {0}")]
    NoPayloadMarker(String),

    /// The footer was cut off by the hosting application
    #[error("Truncated footer: {0}")]
    TruncatedFooter(String),
}

impl ArmorError {
    /// Short, stable name of the failure class for log correlation.
    pub fn kind(&self) -> &'static str {
        match self {
            ArmorError::NoPayloadMarker(_) => "no_payload_marker",
            ArmorError::TruncatedFooter(_) => "truncated_footer",
        }
    }
}

/// Generate a SHA-256 fingerprint of the given bytes as a lowercase hex string.
///
/// # Example
///
/// ```
/// use armor_extractor::types::generate_fingerprint;
///
/// let hash = generate_fingerprint(b"hello");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, generate_fingerprint(b"hello"));
/// ```
pub fn generate_fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    format!("{:x}", result)
}
