//! Armor Extractor - Recover PGP messages from accessibility trees.
//!
//! Mail clients that render messages in a web view do not allow the message
//! text to be selected or copied. The text is still exposed to accessibility
//! services, but as a single content description with every line break
//! removed. This crate finds such messages in an accessibility tree, rebuilds
//! valid ASCII armor from the flattened text, and hands the result to a
//! decrypting application through a temporary file.
//!
//! # Quick Start
//!
//! ```
//! use armor_extractor::locator::{find_pgp_nodes, NodeSnapshot};
//! use armor_extractor::armor::reconstruct;
//!
//! let root = NodeSnapshot::new("android.webkit.WebView").with_child(
//!     NodeSnapshot::new("android.view.View")
//!         .with_text("-----BEGIN PGP MESSAGE-----hQEMA1s=AbCd-----END PGP MESSAGE-----"),
//! );
//!
//! for node in find_pgp_nodes(&&root) {
//!     match reconstruct(&node.text) {
//!         Ok(armored) => println!("{}", armored),
//!         Err(e) => eprintln!("Skipping node: {}", e),
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - [`armor`]: Rebuilds armor from a flattened content description
//! - [`locator`]: Tree search and owned tree snapshots
//! - [`temp_storage`]: Expiring file store handed to the decryptor
//! - [`decrypt`]: Decrypt intent and launchers
//! - [`service`]: Event handling, overlay lifecycle
//! - [`daemon`]: Single-consumer event loop
//! - [`config`]: TOML configuration

pub mod armor;
pub mod config;
pub mod daemon;
pub mod decrypt;
pub mod locator;
pub mod overlay;
pub mod service;
pub mod temp_storage;
pub mod types;

pub use armor::{reconstruct, reconstruct_bytes};
pub use config::Config;
pub use decrypt::{DecryptError, DecryptIntent, DecryptRequest, IntentLauncher};
pub use locator::{find_pgp_nodes, NodeLocator, NodeSnapshot, UiNode};
pub use overlay::{LoggingOverlay, OverlayPresenter};
pub use service::{ArmorService, EventType, ServiceError};
pub use temp_storage::{StorageError, TempFileHandle, TemporaryStorage};
pub use types::{ArmorError, PgpNode, Rect};
