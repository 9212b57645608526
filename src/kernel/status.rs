use alloc::vec::Vec;
use core::fmt;

use crate::KernelError;

/// Kernel initialization status tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed(KernelError),
}

/// Kernel component status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub status: InitStatus,
}

impl ComponentStatus {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            status: InitStatus::NotStarted,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, InitStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, InitStatus::Failed(_))
    }
}

/// Boot phases in the order they run.
#[derive(Debug, Clone, Default)]
pub struct BootStatus {
    components: Vec<ComponentStatus>,
}

impl BootStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track kernel component initialization
    pub fn register(&mut self, name: &'static str) {
        self.components.push(ComponentStatus::new(name));
    }

    pub fn update(&mut self, name: &'static str, status: InitStatus) {
        if let Some(comp) = self.components.iter_mut().find(|c| c.name == name) {
            comp.status = status;
        }
    }

    pub fn get(&self, name: &str) -> Option<InitStatus> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.status)
    }

    pub fn components(&self) -> &[ComponentStatus] {
        &self.components
    }

    /// Check if all components are initialized
    pub fn all_ready(&self) -> bool {
        !self.components.is_empty() && self.components.iter().all(|c| c.is_complete())
    }
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStatus::NotStarted => write!(f, "Not Started"),
            InitStatus::InProgress => write!(f, "In Progress"),
            InitStatus::Completed => write!(f, "Completed"),
            InitStatus::Failed(err) => write!(f, "Failed: {}", err),
        }
    }
}

impl fmt::Display for BootStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for comp in &self.components {
            writeln!(f, "  {:<16} {}", comp.name, comp.status)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_components_in_order() {
        let mut status = BootStatus::new();
        status.register("Physical Memory");
        status.register("Paging");
        assert!(!status.all_ready());

        status.update("Physical Memory", InitStatus::Completed);
        status.update("Paging", InitStatus::Failed(KernelError::OutOfMemory));
        assert_eq!(status.get("Physical Memory"), Some(InitStatus::Completed));
        assert!(status.components()[1].is_failed());
        assert!(!status.all_ready());

        status.update("Paging", InitStatus::Completed);
        assert!(status.all_ready());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            alloc::format!("{}", InitStatus::Failed(KernelError::NotFound)),
            "Failed: not found"
        );

        let mut status = BootStatus::new();
        status.register("Heap");
        status.update("Heap", InitStatus::Completed);
        assert_eq!(alloc::format!("{}", status), "  Heap             Completed\n");
    }
}
