// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant};

use crate::{Error, Result};

/// The deadline policy of a [`Source`][crate::Source] or [`Sink`][crate::Sink].
///
/// A policy combines an optional per-call duration with an optional absolute deadline. Each call
/// on an endpoint starts a fresh [`Deadline`] from the policy, which is then checked before every
/// blocking wait the call performs. The effective limit of a call is the earlier of the two.
///
/// The policy itself is immutable; the combinators return modified copies.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, Instant};
///
/// use pipebuf_io::Timeout;
///
/// // Each call may take at most 5 seconds, and nothing may happen after the hour is up.
/// let timeout = Timeout::after(Duration::from_secs(5))
///     .with_deadline(Instant::now() + Duration::from_secs(3600));
///
/// assert_eq!(timeout.duration(), Some(Duration::from_secs(5)));
/// assert!(timeout.deadline().is_some());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timeout {
    duration: Option<Duration>,
    deadline: Option<Instant>,
}

impl Timeout {
    /// A policy that never expires.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            duration: None,
            deadline: None,
        }
    }

    /// A policy that limits each call to `duration`.
    #[must_use]
    pub const fn after(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            deadline: None,
        }
    }

    /// A policy that expires at the given instant.
    #[must_use]
    pub const fn at(deadline: Instant) -> Self {
        Self {
            duration: None,
            deadline: Some(deadline),
        }
    }

    /// Returns a copy of the policy with the absolute deadline replaced.
    #[must_use]
    pub const fn with_deadline(self, deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..self
        }
    }

    /// Returns a copy of the policy with the per-call duration replaced.
    #[must_use]
    pub const fn with_duration(self, duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            ..self
        }
    }

    /// Returns a policy that never expires.
    #[must_use]
    pub const fn cleared(self) -> Self {
        Self::none()
    }

    /// The per-call duration, if any.
    #[must_use]
    pub const fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// The absolute deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the policy can ever expire.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.duration.is_none() && self.deadline.is_none()
    }

    /// Starts tracking the limit of one call.
    #[must_use]
    pub fn start(&self) -> Deadline {
        let started = Instant::now();

        let relative = self.duration.and_then(|duration| started.checked_add(duration));
        let limit = match (relative, self.deadline) {
            (Some(relative), Some(absolute)) => Some(relative.min(absolute)),
            (relative, absolute) => relative.or(absolute),
        };

        Deadline { started, limit }
    }
}

/// The limit of one in-flight call, created by [`Timeout::start()`].
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    started: Instant,
    limit: Option<Instant>,
}

impl Deadline {
    /// Fails with [`Error::TimedOut`] if the limit has been reached.
    ///
    /// Call this before every blocking wait.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimedOut`] once the limit has passed.
    pub fn check(&self) -> Result<()> {
        let Some(limit) = self.limit else {
            return Ok(());
        };

        let now = Instant::now();
        if now < limit {
            return Ok(());
        }

        let elapsed = now.duration_since(self.started);

        tracing::event!(
            name: "pipebuf.timeout",
            tracing::Level::WARN,
            timeout.elapsed_ms = elapsed.as_millis(),
            "deadline reached"
        );

        Err(Error::TimedOut { elapsed })
    }

    /// Time left until the limit is reached, or `None` if there is no limit.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.limit.map(|limit| limit.saturating_duration_since(Instant::now()))
    }

    /// How long ago the call started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
