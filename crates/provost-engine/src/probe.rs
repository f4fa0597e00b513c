//! Runtime probe for driver-reported insert identifiers.
//!
//! Some driver/proxy configurations do not return a usable auto-generated
//! identifier after an insert. Re-querying on every insert would be wasteful
//! when the fast path works; trusting it blindly loses rows when it does
//! not. The probe settles the question once per engine instance, on the
//! first insert of a batch, and the verdict is final: a later transient
//! failure cannot flip a `Supported` connection back to `Unknown`.

use std::sync::atomic::{AtomicU8, Ordering};

/// Whether the storage driver reports usable generated identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertIdSupport {
    /// Not yet probed.
    Unknown,
    /// The driver-reported identifier is trustworthy.
    Supported,
    /// The driver reports nothing useful; rows are re-queried by natural key.
    Unsupported,
}

const UNKNOWN: u8 = 0;
const SUPPORTED: u8 = 1;
const UNSUPPORTED: u8 = 2;

/// Instance-owned tri-state capability cache.
#[derive(Debug, Default)]
pub struct InsertCapabilityProbe {
    state: AtomicU8,
}

impl InsertCapabilityProbe {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNKNOWN),
        }
    }

    pub fn current(&self) -> InsertIdSupport {
        decode(self.state.load(Ordering::Acquire))
    }

    /// Record the conclusion of a first probe.
    ///
    /// Compare-and-set from `Unknown`: when two batches probe concurrently,
    /// only the first writer wins and both observe the same converged state.
    pub fn converge(&self, observed: InsertIdSupport) -> InsertIdSupport {
        let raw = match observed {
            InsertIdSupport::Supported => SUPPORTED,
            InsertIdSupport::Unsupported => UNSUPPORTED,
            InsertIdSupport::Unknown => return self.current(),
        };
        match self
            .state
            .compare_exchange(UNKNOWN, raw, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => observed,
            Err(current) => decode(current),
        }
    }
}

const fn decode(raw: u8) -> InsertIdSupport {
    match raw {
        SUPPORTED => InsertIdSupport::Supported,
        UNSUPPORTED => InsertIdSupport::Unsupported,
        _ => InsertIdSupport::Unknown,
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown() {
        assert_eq!(InsertCapabilityProbe::new().current(), InsertIdSupport::Unknown);
    }

    #[test]
    fn first_writer_wins() {
        let probe = InsertCapabilityProbe::new();
        assert_eq!(
            probe.converge(InsertIdSupport::Unsupported),
            InsertIdSupport::Unsupported
        );
        // a later, contradictory probe cannot flip the verdict
        assert_eq!(
            probe.converge(InsertIdSupport::Supported),
            InsertIdSupport::Unsupported
        );
        assert_eq!(probe.current(), InsertIdSupport::Unsupported);
    }

    #[test]
    fn converging_on_unknown_is_a_read() {
        let probe = InsertCapabilityProbe::new();
        assert_eq!(
            probe.converge(InsertIdSupport::Unknown),
            InsertIdSupport::Unknown
        );
        probe.converge(InsertIdSupport::Supported);
        assert_eq!(
            probe.converge(InsertIdSupport::Unknown),
            InsertIdSupport::Supported
        );
    }
}
