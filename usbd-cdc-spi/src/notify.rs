//! SERIAL_STATE carrier-detect notification
//!
//! The 10-byte notification doesn't fit the 8-byte interrupt endpoint, so it
//! goes out as two transmissions one main-loop iteration apart: the first 8
//! bytes, then the trailing 2. Host drivers reassemble it; keep the split.

use cdc_spi_protocol::{SerialStateNotification, SERIAL_STATE_NOTIFICATION_LEN};
use usb_device::UsbError;

use crate::link::HostLink;

/// Bytes in the first transmission
const ANNOUNCE_LEN: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotifyState {
    Idle,
    /// First 8 bytes pending
    ArmedAnnounce,
    /// Trailing 2 bytes pending
    ArmedRetract,
}

pub struct SerialStateNotifier {
    state: NotifyState,
    frame: [u8; SERIAL_STATE_NOTIFICATION_LEN],
}

impl SerialStateNotifier {
    pub fn new(interface: u8) -> Self {
        Self {
            state: NotifyState::Idle,
            frame: SerialStateNotification::carrier(interface.into()).encode(),
        }
    }

    pub fn state(&self) -> NotifyState {
        self.state
    }

    /// The host opened the port. A sequence already under way is not
    /// restarted.
    pub fn arm(&mut self) {
        if self.state == NotifyState::Idle {
            debug!("Serial state notification armed");
            self.state = NotifyState::ArmedAnnounce;
        }
    }

    pub fn reset(&mut self) {
        self.state = NotifyState::Idle;
    }

    /// One main-loop step: sends at most one fragment
    pub fn poll<L: HostLink>(&mut self, link: &mut L) {
        let (fragment, next) = match self.state {
            NotifyState::Idle => return,
            NotifyState::ArmedAnnounce => (&self.frame[..ANNOUNCE_LEN], NotifyState::ArmedRetract),
            NotifyState::ArmedRetract => (&self.frame[ANNOUNCE_LEN..], NotifyState::Idle),
        };

        match link.write_notification(fragment) {
            Ok(_) => {
                debug!("Serial state fragment sent, now {}", next);
                self.state = next;
            }
            Err(UsbError::WouldBlock) => {}
            Err(_) => {
                error!("Error writing serial state notification");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeLink;

    #[test]
    fn two_fragments_one_iteration_apart() {
        let mut link = FakeLink::new();
        let mut notifier = SerialStateNotifier::new(0);

        notifier.poll(&mut link);
        assert!(link.notifications.is_empty());

        notifier.arm();
        notifier.poll(&mut link);
        assert_eq!(notifier.state(), NotifyState::ArmedRetract);
        assert_eq!(link.notifications.len(), 1);
        assert_eq!(&link.notifications[0][..], &[0xa1, 0x20, 0, 0, 0, 0, 2, 0]);

        notifier.poll(&mut link);
        assert_eq!(notifier.state(), NotifyState::Idle);
        assert_eq!(link.notifications.len(), 2);
        assert_eq!(&link.notifications[1][..], &[3, 0]);

        for _ in 0..4 {
            notifier.poll(&mut link);
        }
        assert_eq!(link.notifications.len(), 2);
    }

    #[test]
    fn busy_endpoint_holds_the_fragment() {
        let mut link = FakeLink::new();
        let mut notifier = SerialStateNotifier::new(1);
        notifier.arm();

        link.notify_busy = true;
        notifier.poll(&mut link);
        notifier.poll(&mut link);
        assert_eq!(notifier.state(), NotifyState::ArmedAnnounce);
        assert!(link.notifications.is_empty());

        link.notify_busy = false;
        notifier.poll(&mut link);
        assert_eq!(&link.notifications[0][..], &[0xa1, 0x20, 0, 0, 1, 0, 2, 0]);
    }

    #[test]
    fn rearming_mid_sequence_does_not_restart() {
        let mut link = FakeLink::new();
        let mut notifier = SerialStateNotifier::new(0);

        notifier.arm();
        notifier.poll(&mut link);
        notifier.arm();
        assert_eq!(notifier.state(), NotifyState::ArmedRetract);
        notifier.poll(&mut link);
        assert_eq!(notifier.state(), NotifyState::Idle);

        notifier.arm();
        assert_eq!(notifier.state(), NotifyState::ArmedAnnounce);
    }
}
