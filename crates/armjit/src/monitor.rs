//! The shared exclusive monitor.

use std::sync::Mutex;

const RESERVATION_GRANULE_MASK: u64 = 0xFFFF_FFFF_FFFF_FFF8;
const INVALID_ADDRESS: u64 = u64::MAX;

#[derive(Clone, Copy)]
struct Reservation {
    address: u64,
    value: u128,
}

/// Serialises exclusive accesses among cooperating JIT instances. One
/// monitor is shared by every processor taking part; each marks a
/// reservation granule on exclusive reads and attempts a compare-style
/// store on exclusive writes.
pub struct ExclusiveMonitor {
    state: Mutex<Vec<Reservation>>,
}

impl ExclusiveMonitor {
    pub fn new(processor_count: usize) -> ExclusiveMonitor {
        ExclusiveMonitor {
            state: Mutex::new(vec![
                Reservation { address: INVALID_ADDRESS, value: 0 };
                processor_count
            ]),
        }
    }

    /// Perform an exclusive read: mark the granule for `processor_id` and
    /// remember the observed value for the later exclusive write.
    pub fn read_and_mark(&self, processor_id: usize, vaddr: u64, read: impl FnOnce() -> u128) -> u128 {
        let address = vaddr & RESERVATION_GRANULE_MASK;
        let mut state = self.state.lock().unwrap();
        let value = read();
        state[processor_id] = Reservation { address, value };
        value
    }

    /// Attempt the exclusive write: when the processor still holds a
    /// reservation for the granule, `write` is called with the expected
    /// (previously read) value and decides success. Any attempt clears this
    /// processor's reservation, and success steals everyone else's for the
    /// granule.
    pub fn do_exclusive_operation(
        &self,
        processor_id: usize,
        vaddr: u64,
        write: impl FnOnce(u128) -> bool,
    ) -> bool {
        let address = vaddr & RESERVATION_GRANULE_MASK;
        let mut state = self.state.lock().unwrap();

        let reservation = state[processor_id];
        state[processor_id].address = INVALID_ADDRESS;
        if reservation.address != address {
            return false;
        }

        let success = write(reservation.value);
        if success {
            for other in state.iter_mut() {
                if other.address == address {
                    other.address = INVALID_ADDRESS;
                }
            }
        }
        success
    }

    /// Drop a processor's reservation (CLREX or context switches).
    pub fn clear_processor(&self, processor_id: usize) {
        self.state.lock().unwrap()[processor_id].address = INVALID_ADDRESS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_round_trip_succeeds() {
        let monitor = ExclusiveMonitor::new(2);
        let value = monitor.read_and_mark(0, 0x1000, || 42);
        assert_eq!(value, 42);
        let ok = monitor.do_exclusive_operation(0, 0x1000, |expected| {
            assert_eq!(expected, 42);
            true
        });
        assert!(ok);
    }

    #[test]
    fn write_without_reservation_fails() {
        let monitor = ExclusiveMonitor::new(1);
        assert!(!monitor.do_exclusive_operation(0, 0x1000, |_| true));
    }

    #[test]
    fn successful_write_steals_other_reservations() {
        let monitor = ExclusiveMonitor::new(2);
        monitor.read_and_mark(0, 0x1000, || 1);
        monitor.read_and_mark(1, 0x1000, || 1);
        assert!(monitor.do_exclusive_operation(0, 0x1000, |_| true));
        assert!(!monitor.do_exclusive_operation(1, 0x1000, |_| true));
    }

    #[test]
    fn different_granules_do_not_interfere() {
        let monitor = ExclusiveMonitor::new(2);
        monitor.read_and_mark(0, 0x1000, || 1);
        monitor.read_and_mark(1, 0x2000, || 2);
        assert!(monitor.do_exclusive_operation(0, 0x1000, |_| true));
        assert!(monitor.do_exclusive_operation(1, 0x2000, |_| true));
    }
}
