//! Rebuilds OpenPGP ASCII armor from a flattened content description.
//!
//! Web views expose the rendered text of a message only through the content
//! description of their text runs, and that description has every line break
//! removed. An armored message is still recoverable because its layout is
//! fixed by the armor format:
//!
//! ```text
//! -----BEGIN PGP MESSAGE-----
//!
//! hQEMA... (base64 body, 64 characters per line)
//! =AbCd
//! -----END PGP MESSAGE-----
//! ```
//!
//! The body of an encrypted message always starts with `hQ`, the base64 form
//! of a public-key encrypted session key packet tag, and the checksum is always
//! the 5 characters right in front of the footer.

use crate::types::ArmorError;

/// Armor header marker.
pub const BEGIN_PGP_MESSAGE: &str = "-----BEGIN PGP MESSAGE-----";

/// Armor footer marker.
pub const END_PGP_MESSAGE: &str = "-----END PGP MESSAGE-----";

/// Base64 prefix of the first packet of an encrypted message.
pub const PAYLOAD_MARKER: &str = "hQ";

/// Payload characters per body line.
pub const LINE_WIDTH: usize = 64;

/// Length of the checksum line (`=` plus 4 base64 characters).
pub const CHECKSUM_LENGTH: usize = 5;

/// Remove every `\r` and `\n` from `text`.
///
/// # Example
///
/// ```
/// use armor_extractor::armor::strip_line_breaks;
///
/// assert_eq!(strip_line_breaks("ab\ncd\r\nef"), "abcdef");
/// ```
pub fn strip_line_breaks(text: &str) -> String {
    text.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

/// Rebuild a valid armored message from a linebreak-free content description.
///
/// Everything in front of the first `hQ` is discarded and replaced with the
/// canonical header. The body is wrapped at [`LINE_WIDTH`] characters, and the
/// [`CHECKSUM_LENGTH`] characters in front of the last footer marker become
/// the checksum line. Text after the footer is dropped.
///
/// # Errors
///
/// - `ArmorError::NoPayloadMarker` - no `hQ` in the text, or too few
///   characters between the marker and the footer to hold a body and checksum
/// - `ArmorError::TruncatedFooter` - the footer is missing after the marker
///
/// # Example
///
/// ```
/// use armor_extractor::armor::reconstruct;
///
/// let armored = reconstruct("junkhQEMA1s=AbCd-----END PGP MESSAGE-----").unwrap();
/// assert_eq!(
///     armored,
///     "-----BEGIN PGP MESSAGE-----\n\nhQEMA1s\n=AbCd\n-----END PGP MESSAGE-----"
/// );
/// ```
pub fn reconstruct(description: &str) -> Result<String, ArmorError> {
    let start = description.find(PAYLOAD_MARKER).ok_or_else(|| {
        ArmorError::NoPayloadMarker(format!(
            "'{}' not found in {} characters of text",
            PAYLOAD_MARKER,
            description.chars().count()
        ))
    })?;

    // Already formatted input must not keep its old breaks
    let payload = strip_line_breaks(&description[start..]);

    let footer_start = payload.rfind(END_PGP_MESSAGE).ok_or_else(|| {
        ArmorError::TruncatedFooter(format!(
            "'{}' not found after payload marker ({} characters)",
            END_PGP_MESSAGE,
            payload.chars().count()
        ))
    })?;

    let before_footer: Vec<char> = payload[..footer_start].chars().collect();
    if before_footer.len() < PAYLOAD_MARKER.len() + CHECKSUM_LENGTH {
        return Err(ArmorError::NoPayloadMarker(format!(
            "only {} characters between payload marker and footer, need at least {}",
            before_footer.len(),
            PAYLOAD_MARKER.len() + CHECKSUM_LENGTH
        )));
    }

    let (body, checksum) = before_footer.split_at(before_footer.len() - CHECKSUM_LENGTH);
    if checksum[0] != '=' {
        log::warn!(
            "[ARMOR] ⚠️  Checksum line does not start with '=': {}",
            checksum.iter().collect::<String>()
        );
    }

    let line_count = (body.len() + LINE_WIDTH - 1) / LINE_WIDTH;
    let mut armored = String::with_capacity(
        BEGIN_PGP_MESSAGE.len() + body.len() + line_count + CHECKSUM_LENGTH + END_PGP_MESSAGE.len() + 4,
    );
    armored.push_str(BEGIN_PGP_MESSAGE);
    armored.push_str("\n\n");
    for (i, line) in body.chunks(LINE_WIDTH).enumerate() {
        if i > 0 {
            armored.push('\n');
        }
        armored.extend(line.iter());
    }
    armored.push('\n');
    armored.extend(checksum.iter());
    armored.push('\n');
    armored.push_str(END_PGP_MESSAGE);

    if log::log_enabled!(log::Level::Debug) {
        // One record per line, long messages get cut otherwise
        for line in armored.lines() {
            log::debug!("[ARMOR] {}", line);
        }
    }

    Ok(armored)
}

/// [`reconstruct`], returning the bytes handed to the temporary store.
pub fn reconstruct_bytes(description: &str) -> Result<Vec<u8>, ArmorError> {
    reconstruct(description).map(String::into_bytes)
}
