//! Request/acknowledgement state machine
//!
//! At most one request is outstanding. A write waits for the display's
//! "OK"; a read waits for the read reply. Completion from the transport
//! and the one-tick settling steps are modelled as events so the whole
//! lifecycle lives in [`TxState::transition`].

use dwin_protocol::Tick;

/// Transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxState {
    /// No request outstanding
    Idle,
    /// Write frame handed to the transport
    SendingWrite,
    /// Read frame handed to the transport
    SendingRead,
    /// Write frame fully sent
    WriteSendComplete,
    /// Read frame fully sent
    ReadSendComplete,
    /// Waiting for "OK"
    AwaitingWriteAck,
    /// Waiting for the read reply
    AwaitingReadReply,
    /// "OK" received, back to idle on the next tick
    WriteAckReceived,
    /// Reply received, back to idle on the next tick
    ReadReplyReceived,
}

/// Events driving the transaction state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxEvent {
    /// A write request was handed to the transport
    WriteIssued,
    /// A read request was handed to the transport
    ReadIssued,
    /// The transport finished sending
    SendComplete,
    /// Once-per-tick settling step
    Advance,
    /// The display acknowledged a write
    WriteAck,
    /// The display sent a read reply
    ReadReply,
    /// Timeout or link reset
    Abandon,
}

impl TxState {
    /// True if no request is outstanding
    pub fn is_idle(&self) -> bool {
        matches!(self, TxState::Idle)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: TxEvent) -> Self {
        use TxEvent::*;
        use TxState::*;

        match (self, event) {
            // New requests only from idle
            (Idle, WriteIssued) => SendingWrite,
            (Idle, ReadIssued) => SendingRead,

            // Transport completion
            (SendingWrite, SendComplete) => WriteSendComplete,
            (SendingRead, SendComplete) => ReadSendComplete,

            // Settling, one step per tick
            (WriteSendComplete, Advance) => AwaitingWriteAck,
            (ReadSendComplete, Advance) => AwaitingReadReply,
            (WriteAckReceived, Advance) => Idle,
            (ReadReplyReceived, Advance) => Idle,

            // Responses only count when expected
            (AwaitingWriteAck, WriteAck) => WriteAckReceived,
            (AwaitingReadReply, ReadReply) => ReadReplyReceived,

            (_, Abandon) => Idle,

            // Default: stay in current state
            _ => self,
        }
    }
}

/// The open transaction, if any, and when it was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transaction {
    state: TxState,
    sent_at: Tick,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    /// Idle transaction
    pub const fn new() -> Self {
        Self {
            state: TxState::Idle,
            sent_at: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Tick at which the current request was sent
    pub fn sent_at(&self) -> Tick {
        self.sent_at
    }

    /// Record a request handed to the transport at `now`
    pub fn begin(&mut self, issued: TxEvent, now: Tick) {
        self.state = self.state.transition(issued);
        self.sent_at = now;
    }

    /// Apply an event, returning the new state
    pub fn apply(&mut self, event: TxEvent) -> TxState {
        self.state = self.state.transition(event);
        self.state
    }

    /// Drop back to idle
    pub fn reset(&mut self) {
        self.state = TxState::Idle;
    }

    /// Abandon a request outstanding for `timeout` ticks or more
    ///
    /// Returns true if the transaction was abandoned.
    pub fn check_timeout(&mut self, now: Tick, timeout: Tick) -> bool {
        if self.state.is_idle() {
            return false;
        }
        if now.wrapping_sub(self.sent_at) >= timeout {
            self.state = TxState::Idle;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_flow() {
        let s = TxState::Idle.transition(TxEvent::WriteIssued);
        assert_eq!(s, TxState::SendingWrite);
        let s = s.transition(TxEvent::SendComplete);
        assert_eq!(s, TxState::WriteSendComplete);
        let s = s.transition(TxEvent::Advance);
        assert_eq!(s, TxState::AwaitingWriteAck);
        let s = s.transition(TxEvent::WriteAck);
        assert_eq!(s, TxState::WriteAckReceived);
        assert_eq!(s.transition(TxEvent::Advance), TxState::Idle);
    }

    #[test]
    fn test_read_flow() {
        let s = TxState::Idle
            .transition(TxEvent::ReadIssued)
            .transition(TxEvent::SendComplete)
            .transition(TxEvent::Advance);
        assert_eq!(s, TxState::AwaitingReadReply);
        let s = s.transition(TxEvent::ReadReply);
        assert_eq!(s, TxState::ReadReplyReceived);
        assert_eq!(s.transition(TxEvent::Advance), TxState::Idle);
    }

    #[test]
    fn test_requests_rejected_when_open() {
        for state in [
            TxState::SendingWrite,
            TxState::AwaitingReadReply,
            TxState::WriteAckReceived,
        ] {
            assert_eq!(state.transition(TxEvent::WriteIssued), state);
            assert_eq!(state.transition(TxEvent::ReadIssued), state);
        }
    }

    #[test]
    fn test_advance_does_not_skip_sending() {
        assert_eq!(
            TxState::SendingWrite.transition(TxEvent::Advance),
            TxState::SendingWrite
        );
        assert_eq!(
            TxState::AwaitingWriteAck.transition(TxEvent::Advance),
            TxState::AwaitingWriteAck
        );
    }

    #[test]
    fn test_mismatched_responses_ignored() {
        assert_eq!(
            TxState::AwaitingWriteAck.transition(TxEvent::ReadReply),
            TxState::AwaitingWriteAck
        );
        assert_eq!(
            TxState::AwaitingReadReply.transition(TxEvent::WriteAck),
            TxState::AwaitingReadReply
        );
        // Acks arriving before the send completes are not ours
        assert_eq!(
            TxState::SendingWrite.transition(TxEvent::WriteAck),
            TxState::SendingWrite
        );
    }

    #[test]
    fn test_abandon_from_any_state() {
        for state in [
            TxState::SendingRead,
            TxState::ReadSendComplete,
            TxState::AwaitingWriteAck,
            TxState::ReadReplyReceived,
        ] {
            assert_eq!(state.transition(TxEvent::Abandon), TxState::Idle);
        }
    }

    #[test]
    fn test_timeout_at_boundary() {
        let mut tx = Transaction::new();
        tx.begin(TxEvent::WriteIssued, 500);
        assert!(!tx.check_timeout(1499, 1000));
        assert_eq!(tx.state(), TxState::SendingWrite);
        assert!(tx.check_timeout(1500, 1000));
        assert!(tx.state().is_idle());
        assert!(!tx.check_timeout(5000, 1000));
    }

    #[test]
    fn test_timeout_across_wrap() {
        let mut tx = Transaction::new();
        tx.begin(TxEvent::ReadIssued, u32::MAX - 1);
        assert_eq!(tx.sent_at(), u32::MAX - 1);
        assert!(!tx.check_timeout(7, 10));
        assert!(tx.check_timeout(8, 10));
    }
}
