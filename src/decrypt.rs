//! Hand-off of a reconstructed message to the decrypting application.
//!
//! The armored text is written to the temporary store first; only after the
//! write has completed is the decrypt intent launched with the file's URI.

use crate::armor;
use crate::config::DecryptConfig;
use crate::temp_storage::{StorageError, TempFileHandle, TemporaryStorage};
use crate::types::{generate_fingerprint, ArmorError, PgpNode};
use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Start the activity in a new task.
pub const FLAG_ACTIVITY_NEW_TASK: u32 = 0x1000_0000;

/// Clear any existing instance of the activity on top of the stack.
pub const FLAG_ACTIVITY_CLEAR_TOP: u32 = 0x0400_0000;

/// Errors that can occur while handing a message to the decryptor.
#[derive(Debug, Error)]
pub enum DecryptError {
    /// The node text could not be turned into an armored message
    #[error(transparent)]
    Armor(#[from] ArmorError),

    /// The temporary file could not be created or written
    #[error("Temporary store write failed: {0}")]
    TemporaryStoreWriteFailure(#[from] StorageError),

    /// The decrypting application could not be started
    #[error("Launch failed: {0}")]
    LaunchFailed(String),
}

/// Inter-process request to decrypt the data behind a URI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecryptIntent {
    pub action: String,
    pub data: String,
    pub flags: u32,
}

impl DecryptIntent {
    /// Intent for `data` with the new-task and clear-top flags set.
    pub fn new(action: &str, data: &str) -> Self {
        Self {
            action: action.to_string(),
            data: data.to_string(),
            flags: FLAG_ACTIVITY_NEW_TASK | FLAG_ACTIVITY_CLEAR_TOP,
        }
    }

    /// Arguments in the form accepted by `am start`.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "-a".to_string(),
            self.action.clone(),
            "-d".to_string(),
            self.data.clone(),
            "-f".to_string(),
            format!("0x{:08x}", self.flags),
        ]
    }
}

/// Starts the decrypting application.
pub trait IntentLauncher {
    fn launch(&mut self, intent: &DecryptIntent) -> Result<(), DecryptError>;
}

impl<T: IntentLauncher + ?Sized> IntentLauncher for Box<T> {
    fn launch(&mut self, intent: &DecryptIntent) -> Result<(), DecryptError> {
        (**self).launch(intent)
    }
}

/// Launcher for the configured program, or [`StdoutLauncher`] if there is none.
pub fn launcher_from_config(config: &DecryptConfig) -> Box<dyn IntentLauncher> {
    match &config.program {
        Some(program) => Box::new(CommandLauncher::new(program, &config.args)),
        None => Box::new(StdoutLauncher),
    }
}

/// Runs an external program with the intent appended to its arguments.
///
/// With `program = "adb"` and `args = ["shell", "am", "start"]` this starts
/// the activity on a connected device.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn new(program: &str, args: &[String]) -> Self {
        Self {
            program: program.to_string(),
            args: args.to_vec(),
        }
    }
}

impl IntentLauncher for CommandLauncher {
    fn launch(&mut self, intent: &DecryptIntent) -> Result<(), DecryptError> {
        log::debug!("[DECRYPT] Running {} {:?} {:?}", self.program, self.args, intent.to_args());

        let output = Command::new(&self.program)
            .args(&self.args)
            .args(intent.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| DecryptError::LaunchFailed(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DecryptError::LaunchFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Prints each intent as one JSON line on stdout.
///
/// Used when no launcher program is configured.
#[derive(Debug, Default, Clone)]
pub struct StdoutLauncher;

impl IntentLauncher for StdoutLauncher {
    fn launch(&mut self, intent: &DecryptIntent) -> Result<(), DecryptError> {
        let line = serde_json::to_string(intent).map_err(|e| DecryptError::LaunchFailed(e.to_string()))?;
        println!("{}", line);
        Ok(())
    }
}

/// Outcome of a successful hand-off.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecryptRequest {
    pub file: TempFileHandle,
    pub intent: DecryptIntent,
    /// SHA-256 of the armored bytes
    pub fingerprint: String,
}

/// Reconstruct the armor of `node`, store it, and launch the decrypt intent.
///
/// Nothing is launched when any earlier step fails.
pub fn decrypt_node<L: IntentLauncher + ?Sized>(
    node: &PgpNode,
    storage: &TemporaryStorage,
    launcher: &mut L,
    action: &str,
) -> Result<DecryptRequest, DecryptError> {
    let armored = armor::reconstruct_bytes(&node.text)?;
    let fingerprint = generate_fingerprint(&armored);

    let file = storage.create_file()?;
    storage.write(&file, &armored)?;

    let intent = DecryptIntent::new(action, &file.uri);
    launcher.launch(&intent)?;

    log::info!(
        "[DECRYPT] 🔓 Handed {} bytes to decryptor via {} [{}]",
        armored.len(),
        file.uri,
        &fingerprint[..12]
    );

    Ok(DecryptRequest {
        file,
        intent,
        fingerprint,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Records launched intents; optionally fails every launch.
    #[derive(Debug, Default)]
    pub struct RecordingLauncher {
        pub launched: Vec<DecryptIntent>,
        pub fail: bool,
    }

    impl IntentLauncher for RecordingLauncher {
        fn launch(&mut self, intent: &DecryptIntent) -> Result<(), DecryptError> {
            if self.fail {
                return Err(DecryptError::LaunchFailed("refused".into()));
            }
            self.launched.push(intent.clone());
            Ok(())
        }
    }
}
