//! Root directory acquisition.
//!
//! Obtaining a root handle is a user decision. Dismissing the prompt is a
//! normal outcome (`Ok(None)`), not an error, and a second acquisition while
//! one is in progress is refused.

use super::{DirRef, LocalDirectory};
use crate::error::HostError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Source of a user-granted root directory.
#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    /// Ask for a directory. `Ok(None)` means the user cancelled.
    async fn pick(&self) -> Result<Option<DirRef>, HostError>;
}

/// Single-flight guard around a picker.
#[derive(Debug, Default)]
pub struct PickerGuard {
    busy: AtomicBool,
}

/// Held while a pick is in progress; releases the guard on drop.
#[derive(Debug)]
pub struct PickerPermit<'a> {
    guard: &'a PickerGuard,
}

impl Drop for PickerPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

impl PickerGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard, failing with [`HostError::PickerBusy`] if it is already held.
    pub fn acquire(&self) -> Result<PickerPermit<'_>, HostError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| HostError::PickerBusy)?;
        Ok(PickerPermit { guard: self })
    }

    /// Run `picker` under the guard.
    pub async fn pick(&self, picker: &dyn DirectoryPicker) -> Result<Option<DirRef>, HostError> {
        let _permit = self.acquire()?;
        picker.pick().await
    }
}

/// Picker that returns a preselected answer: a directory, or a cancellation.
#[derive(Clone)]
pub struct FixedPicker {
    choice: Option<DirRef>,
}

impl FixedPicker {
    pub fn new(choice: DirRef) -> Self {
        Self {
            choice: Some(choice),
        }
    }

    pub fn cancelled() -> Self {
        Self { choice: None }
    }
}

#[async_trait]
impl DirectoryPicker for FixedPicker {
    async fn pick(&self) -> Result<Option<DirRef>, HostError> {
        Ok(self.choice.clone())
    }
}

/// Interactive terminal picker for local directories.
#[derive(Debug, Clone, Default)]
pub struct ConsolePicker {
    suggested: Option<PathBuf>,
}

impl ConsolePicker {
    pub fn new(suggested: Option<PathBuf>) -> Self {
        Self { suggested }
    }
}

#[async_trait]
impl DirectoryPicker for ConsolePicker {
    async fn pick(&self) -> Result<Option<DirRef>, HostError> {
        let suggested = self.suggested.clone();
        let chosen = tokio::task::spawn_blocking(move || prompt_for_directory(suggested))
            .await
            .map_err(|e| HostError::Io(std::io::Error::other(e.to_string())))??;

        match chosen {
            Some(path) => {
                let dir = LocalDirectory::open(&path)?;
                Ok(Some(Arc::new(dir)))
            }
            None => {
                info!("Directory selection cancelled");
                Ok(None)
            }
        }
    }
}

fn prompt_for_directory(suggested: Option<PathBuf>) -> Result<Option<PathBuf>, HostError> {
    use dialoguer::{Confirm, Input};

    let to_io = |e: dialoguer::Error| HostError::Io(std::io::Error::other(e.to_string()));

    let path = match suggested {
        Some(path) => path,
        None => {
            let entered = Input::<String>::new()
                .with_prompt("Directory to open as workspace")
                .allow_empty(true)
                .interact_text()
                .map_err(to_io)?;
            if entered.trim().is_empty() {
                return Ok(None);
            }
            PathBuf::from(entered.trim())
        }
    };

    let granted = Confirm::new()
        .with_prompt(format!(
            "Allow read and write access to {}?",
            path.display()
        ))
        .default(false)
        .interact_opt()
        .map_err(to_io)?;

    Ok(match granted {
        Some(true) => Some(path),
        _ => None,
    })
}
