//! Command status bit mask.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Lifecycle status of a [`Command`](super::Command).
    ///
    /// Several bits may be set at once. The composite constants are masks,
    /// tested with the predicate methods rather than compared for equality.
    ///
    /// ```rust
    /// use devfsm::command::CommandStatus;
    ///
    /// let status = CommandStatus::FAILED;
    /// assert!(status.is_complete());
    /// assert!(status.is_error());
    /// assert!(!status.is_active());
    /// ```
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CommandStatus: u16 {
        const CREATED = 1;
        const PENDING = 1 << 1;
        const PROCESSING = 1 << 2;
        const SUCCESS = 1 << 3;
        const FAILED = 1 << 4;
        const TIMEOUT = 1 << 5;
        const IGNORED = 1 << 6;
        const WRONG = 1 << 7;
        const REJECTED = 1 << 8;

        const ACTIVE = Self::PENDING.bits() | Self::PROCESSING.bits();
        const PROCESSING_COMPLETE = Self::SUCCESS.bits()
            | Self::FAILED.bits()
            | Self::TIMEOUT.bits()
            | Self::IGNORED.bits()
            | Self::WRONG.bits()
            | Self::REJECTED.bits();
        const ERROR = Self::FAILED.bits() | Self::TIMEOUT.bits() | Self::WRONG.bits();
        const PROCESSED = Self::SUCCESS.bits()
            | Self::FAILED.bits()
            | Self::IGNORED.bits()
            | Self::REJECTED.bits();
    }
}

impl CommandStatus {
    /// The individual status bits, in lifecycle order.
    pub const SINGLE: [CommandStatus; 9] = [
        Self::CREATED,
        Self::PENDING,
        Self::PROCESSING,
        Self::SUCCESS,
        Self::FAILED,
        Self::TIMEOUT,
        Self::IGNORED,
        Self::WRONG,
        Self::REJECTED,
    ];

    /// Statuses that end the waiting or processing window of a command and
    /// therefore disarm its running timer.
    pub(crate) const STOPS_TIMER: CommandStatus = Self::PROCESSING
        .union(Self::PROCESSING_COMPLETE)
        .union(Self::PROCESSED);

    /// Waiting in a queue or being processed.
    pub fn is_active(self) -> bool {
        self.intersects(Self::ACTIVE)
    }

    /// Reached any terminal outcome.
    pub fn is_complete(self) -> bool {
        self.intersects(Self::PROCESSING_COMPLETE)
    }

    pub fn is_error(self) -> bool {
        self.intersects(Self::ERROR)
    }

    pub fn is_processed(self) -> bool {
        self.intersects(Self::PROCESSED)
    }

    pub fn is_pending(self) -> bool {
        self.contains(Self::PENDING)
    }

    pub fn in_processing(self) -> bool {
        self.contains(Self::PROCESSING)
    }

    pub fn is_success(self) -> bool {
        self.contains(Self::SUCCESS)
    }

    pub fn is_failed(self) -> bool {
        self.contains(Self::FAILED)
    }

    pub fn is_timed_out(self) -> bool {
        self.contains(Self::TIMEOUT)
    }

    pub fn is_wrong(self) -> bool {
        self.contains(Self::WRONG)
    }

    /// Names of the single bits that are set, e.g. `["FAILED"]`.
    pub fn bit_names(self) -> Vec<&'static str> {
        self.iter_names()
            .filter(|(_, flag)| Self::SINGLE.contains(flag))
            .map(|(name, _)| name)
            .collect()
    }
}

impl Default for CommandStatus {
    fn default() -> Self {
        Self::CREATED
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.bit_names();
        if names.is_empty() {
            f.write_str("NA")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}
