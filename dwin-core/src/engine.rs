//! The DWIN link engine
//!
//! [`Dwin`] is driven entirely from the host loop through [`Dwin::tick`].
//! Each tick moves at most one received byte through the frame parser,
//! settles the transaction state machine, routes a completed frame, and
//! applies the timeouts. Nothing blocks; transport operations are only
//! started here and finish later through the [`Port`] signals.

use dwin_hal::UartTransport;
use dwin_protocol::{DisplayFrame, FrameParser, Request, RxState, Tick, TxFrame};

use crate::callbacks::{CallbackRegistry, VpCallback};
use crate::config::{LinkConfig, DEFAULT_RING_CAPACITY};
use crate::error::{Error, Result};
use crate::ring::Port;
use crate::stats::{bump, LinkStats};
use crate::transaction::{Transaction, TxEvent, TxState};

/// Overall link status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    /// `init` has not succeeded yet
    Uninitialized,
    /// Receiving and ready for requests
    Operational,
    /// The transport reported an error; the next tick recovers
    TransportError,
}

/// Master-side engine for one display link
///
/// `N` is the ring storage reserved in the [`Port`]; the capacity actually
/// used is chosen at [`Dwin::init`].
///
/// # Example
///
/// ```
/// use dwin_core::{Dwin, LinkConfig, Port};
/// use dwin_hal::MockUart;
///
/// static PORT: Port<32> = Port::new();
///
/// let mut dwin = Dwin::new(MockUart::default(), &PORT, LinkConfig::default());
/// dwin.init(32).unwrap();
///
/// dwin.write_vp(0x1000, &[0x0064, 0x0032], 0).unwrap();
/// assert!(!dwin.is_tx_idle());
/// ```
pub struct Dwin<'a, T: UartTransport, const N: usize = DEFAULT_RING_CAPACITY> {
    transport: T,
    port: &'a Port<N>,
    config: LinkConfig,
    status: LinkStatus,
    parser: FrameParser,
    tx: Transaction,
    tx_frame: TxFrame,
    callbacks: CallbackRegistry,
    stats: LinkStats,
}

impl<'a, T: UartTransport, const N: usize> Dwin<'a, T, N> {
    /// Create an engine; call [`Dwin::init`] before anything else
    pub fn new(transport: T, port: &'a Port<N>, config: LinkConfig) -> Self {
        Self {
            transport,
            port,
            config,
            status: LinkStatus::Uninitialized,
            parser: FrameParser::new(),
            tx: Transaction::new(),
            tx_frame: TxFrame::new(),
            callbacks: CallbackRegistry::new(),
            stats: LinkStats::default(),
        }
    }

    /// Size the receive ring and start reception
    ///
    /// Clears registered callbacks and any open transaction. On failure
    /// the engine stays uninitialized.
    pub fn init(&mut self, ring_capacity: usize) -> Result<()> {
        if self.status != LinkStatus::Uninitialized {
            if self.transport.abort().is_err() {
                warn!("abort before re-init failed");
            }
            self.status = LinkStatus::Uninitialized;
        }

        self.port.ring().configure(ring_capacity)?;
        self.port.reset();
        self.parser.reset();
        self.tx.reset();
        self.callbacks.clear();

        if self.transport.start_receive(ring_capacity).is_err() {
            error!("failed to start reception");
            return Err(Error::Transport);
        }

        self.status = LinkStatus::Operational;
        info!("link up, ring capacity {}", ring_capacity);
        Ok(())
    }

    /// Advance the engine; call frequently relative to the timeouts
    pub fn tick(&mut self, now: Tick) -> Result<()> {
        if self.status == LinkStatus::Uninitialized {
            return Err(Error::NotReady);
        }

        if self.port.take_fault() {
            warn!("transport error signalled");
            self.status = LinkStatus::TransportError;
        }
        if self.status == LinkStatus::TransportError {
            self.recover();
        }

        if self.port.take_tx_complete() {
            let state = self.tx.apply(TxEvent::SendComplete);
            trace!("transmit complete, {:?}", state);
        }

        // At most one byte per tick
        if !self.parser.is_complete() && !self.parser.complete_empty() {
            if let Some(byte) = self.port.ring().pop() {
                self.parser.feed(byte, now);
            }
        }

        self.tx.apply(TxEvent::Advance);

        // Routed after the settling step so a reply in the same tick as
        // the send completion still finds the transaction waiting.
        if let Some(frame) = self.parser.frame().filter(|f| !f.is_truncated()) {
            bump(&mut self.stats.frames_received);
            match DisplayFrame::from_frame(&frame) {
                Ok(DisplayFrame::ReadReply(update)) => {
                    bump(&mut self.stats.read_replies);
                    if self.tx.state() == TxState::AwaitingReadReply {
                        self.tx.apply(TxEvent::ReadReply);
                        debug!("read reply for {:#x}", update.address);
                    }
                    if self.callbacks.dispatch(update) {
                        bump(&mut self.stats.callbacks_dispatched);
                        trace!("dispatched {:#x}, {} words", update.address, update.count);
                    }
                }
                Ok(DisplayFrame::WriteAck) => {
                    if self.tx.state() == TxState::AwaitingWriteAck {
                        self.tx.apply(TxEvent::WriteAck);
                        bump(&mut self.stats.write_acks);
                        debug!("write acknowledged");
                    }
                }
                Ok(DisplayFrame::Other { function_code }) => {
                    trace!("ignoring frame with function {:#x}", function_code);
                }
                Err(_) => {
                    warn!("malformed read reply dropped");
                }
            }
        }
        if let Some(frame) = self.parser.frame().filter(|f| f.is_truncated()) {
            bump(&mut self.stats.frames_discarded);
            warn!("frame exceeds receive buffer, {} bytes dropped", frame.dropped);
        }
        if self.parser.is_complete() {
            self.parser.reset();
        }

        if self.tx.check_timeout(now, self.config.tx_timeout_ticks) {
            bump(&mut self.stats.tx_timeouts);
            warn!("transaction abandoned after {} ticks", self.config.tx_timeout_ticks);
        }
        if self.parser.check_timeout(now, self.config.rx_frame_timeout_ticks) {
            bump(&mut self.stats.frames_discarded);
            warn!("partial frame discarded");
        }

        Ok(())
    }

    /// Write consecutive VPs starting at `address`
    ///
    /// Fails if `values` is empty, the engine is not initialized, a
    /// transaction is open, or the frame would not fit the transmit
    /// buffer.
    pub fn write_vp(&mut self, address: u16, values: &[u16], now: Tick) -> Result<()> {
        if values.is_empty() {
            return Err(Error::InvalidArgument);
        }
        self.ensure_ready()?;
        if !self.tx.state().is_idle() {
            return Err(Error::Busy);
        }

        let frame = Request::WriteVp { address, values }.to_frame()?;
        self.send(frame, TxEvent::WriteIssued, now)?;
        debug!("write {} words to {:#x}", values.len(), address);
        Ok(())
    }

    /// Request `count` consecutive VPs starting at `address`
    ///
    /// The values arrive later through the callback watching `address`.
    /// Fails with [`Error::FrameTooLarge`] if the reply could not fit the
    /// receive buffer (more than
    /// [`MAX_READ_VALUES`](dwin_protocol::MAX_READ_VALUES) words).
    pub fn read_vp(&mut self, address: u16, count: u8, now: Tick) -> Result<()> {
        if count == 0 {
            return Err(Error::InvalidArgument);
        }
        self.ensure_ready()?;
        if !self.tx.state().is_idle() {
            return Err(Error::Busy);
        }

        let frame = Request::ReadVp { address, count }.to_frame()?;
        self.send(frame, TxEvent::ReadIssued, now)?;
        debug!("read {} words from {:#x}", count, address);
        Ok(())
    }

    /// Call `callback` whenever a read reply for `address` arrives
    pub fn register_callback(&mut self, address: u16, callback: VpCallback) -> Result<()> {
        self.ensure_ready()?;
        self.callbacks.register(address, callback)
    }

    /// True if a new request would be accepted
    pub fn is_tx_idle(&self) -> bool {
        self.tx.state().is_idle()
    }

    /// Link status, including an error signalled since the last tick
    pub fn status(&self) -> LinkStatus {
        if self.status == LinkStatus::Operational && self.port.has_fault() {
            return LinkStatus::TransportError;
        }
        self.status
    }

    /// Transaction state
    pub fn tx_state(&self) -> TxState {
        self.tx.state()
    }

    /// Receive parser state
    pub fn rx_state(&self) -> RxState {
        self.parser.state()
    }

    /// Diagnostic counters
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Active configuration
    pub fn config(&self) -> LinkConfig {
        self.config
    }

    /// The most recently built request frame
    pub fn last_request(&self) -> &[u8] {
        &self.tx_frame
    }

    /// The interrupt-facing port
    pub fn port(&self) -> &'a Port<N> {
        self.port
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Receive progress notification; see [`Port::on_rx_event`]
    pub fn on_rx_event(&self, last_index: usize) {
        self.port.on_rx_event(last_index);
    }

    /// Transmit complete notification; see [`Port::on_tx_complete`]
    pub fn on_tx_complete(&self) {
        self.port.on_tx_complete();
    }

    /// Transport error notification; see [`Port::on_error`]
    pub fn on_error(&self) {
        self.port.on_error();
    }

    /// Stop the transport and hand it back
    pub fn release(mut self) -> T {
        if self.status != LinkStatus::Uninitialized && self.transport.abort().is_err() {
            warn!("abort on release failed");
        }
        self.port.reset();
        self.transport
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.status == LinkStatus::Uninitialized {
            return Err(Error::NotReady);
        }
        Ok(())
    }

    fn send(&mut self, frame: TxFrame, issued: TxEvent, now: Tick) -> Result<()> {
        self.tx_frame = frame;
        // A completion left over from an earlier frame must not count
        self.port.take_tx_complete();
        if self.transport.start_transmit(&self.tx_frame).is_err() {
            warn!("transport refused transmit");
            return Err(Error::Transport);
        }
        self.tx.begin(issued, now);
        Ok(())
    }

    fn recover(&mut self) {
        self.parser.reset();
        self.tx.reset();
        if self.transport.abort().is_err() {
            warn!("abort during recovery failed");
        }
        self.port.reset();

        match self.transport.start_receive(self.port.ring().capacity()) {
            Ok(()) => {
                self.status = LinkStatus::Operational;
                bump(&mut self.stats.recoveries);
                info!("link recovered");
            }
            Err(_) => {
                warn!("restart of reception failed, retrying next tick");
            }
        }
    }
}

impl<T: UartTransport, const N: usize> core::fmt::Debug for Dwin<'_, T, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dwin")
            .field("status", &self.status)
            .field("rx_state", &self.parser.state())
            .field("tx_state", &self.tx.state())
            .field("callbacks", &self.callbacks)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwin_hal::MockUart;
    use dwin_protocol::WRITE_ACK_FRAME;

    fn feed(port: &Port<64>, bytes: &[u8]) {
        for &b in bytes {
            port.ring().push(b).unwrap();
        }
    }

    fn run(dwin: &mut Dwin<'_, MockUart, 64>, from: Tick, ticks: u32) -> Tick {
        for t in from..from + ticks {
            dwin.tick(t).unwrap();
        }
        from + ticks
    }

    #[test]
    fn test_operations_need_init() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());

        assert_eq!(dwin.status(), LinkStatus::Uninitialized);
        assert_eq!(dwin.tick(0), Err(Error::NotReady));
        assert_eq!(dwin.write_vp(0, &[1], 0), Err(Error::NotReady));
        assert_eq!(dwin.read_vp(0, 1, 0), Err(Error::NotReady));
        assert_eq!(dwin.register_callback(0, |_| {}), Err(Error::NotReady));
    }

    #[test]
    fn test_argument_errors_come_first() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());
        assert_eq!(dwin.write_vp(0, &[], 0), Err(Error::InvalidArgument));
        assert_eq!(dwin.read_vp(0, 0, 0), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_init_capacity_checks() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());

        assert_eq!(dwin.init(0), Err(Error::InvalidArgument));
        assert_eq!(dwin.init(65), Err(Error::OutOfMemory));
        assert_eq!(dwin.status(), LinkStatus::Uninitialized);

        dwin.init(32).unwrap();
        assert_eq!(dwin.status(), LinkStatus::Operational);
        assert_eq!(dwin.transport().receive_capacity(), 32);
    }

    #[test]
    fn test_init_transport_failure() {
        let port: Port<64> = Port::new();
        let mut uart = MockUart::default();
        uart.set_fail_receive(true);
        let mut dwin = Dwin::new(uart, &port, LinkConfig::default());

        assert_eq!(dwin.init(32), Err(Error::Transport));
        assert_eq!(dwin.status(), LinkStatus::Uninitialized);
    }

    #[test]
    fn test_write_sends_frame_and_goes_busy() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());
        dwin.init(64).unwrap();

        dwin.write_vp(0x1000, &[0x0064, 0x0032], 10).unwrap();
        assert_eq!(
            dwin.transport().last_sent(),
            Some(&[0x5A, 0xA5, 0x07, 0x82, 0x10, 0x00, 0x00, 0x64, 0x00, 0x32][..])
        );
        assert_eq!(dwin.last_request(), dwin.transport().last_sent().unwrap());
        assert_eq!(dwin.tx_state(), TxState::SendingWrite);
        assert_eq!(dwin.write_vp(0x1000, &[1], 11), Err(Error::Busy));
        assert_eq!(dwin.read_vp(0x1000, 1, 11), Err(Error::Busy));
    }

    #[test]
    fn test_oversized_write_rejected() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());
        dwin.init(64).unwrap();

        assert_eq!(dwin.write_vp(0, &[0; 6], 0), Err(Error::FrameTooLarge));
        assert!(dwin.is_tx_idle());
        dwin.write_vp(0, &[0; 5], 0).unwrap();
    }

    static FOUR_WORD_CALLS: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);

    fn four_words(update: dwin_protocol::VpUpdate<'_>) {
        assert_eq!(update.values().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        FOUR_WORD_CALLS.fetch_add(1, core::sync::atomic::Ordering::SeqCst);
    }

    #[test]
    fn test_read_limited_to_reply_buffer() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());
        dwin.init(64).unwrap();
        dwin.register_callback(0x0020, four_words).unwrap();

        assert_eq!(dwin.read_vp(0x0020, 5, 0), Err(Error::FrameTooLarge));
        assert!(dwin.is_tx_idle());
        assert!(dwin.transport().sent().is_empty());

        dwin.read_vp(0x0020, 4, 0).unwrap();
        dwin.on_tx_complete();
        let reply = dwin_protocol::messages::encode_read_reply(0x0020, &[1, 2, 3, 4]).unwrap();
        feed(&port, &reply);
        let t = run(&mut dwin, 0, reply.len() as u32);
        assert_eq!(dwin.tx_state(), TxState::ReadReplyReceived);
        dwin.tick(t).unwrap();

        assert!(dwin.is_tx_idle());
        assert_eq!(FOUR_WORD_CALLS.load(core::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(dwin.stats().frames_discarded, 0);
    }

    #[test]
    fn test_refused_transmit_stays_idle() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());
        dwin.init(64).unwrap();
        dwin.transport_mut().set_fail_transmit(true);

        assert_eq!(dwin.read_vp(0x10, 1, 0), Err(Error::Transport));
        assert!(dwin.is_tx_idle());
    }

    #[test]
    fn test_write_ack_cycle() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());
        dwin.init(64).unwrap();

        dwin.write_vp(0x1000, &[1], 0).unwrap();
        // An ack parsed before the send completes does not close the write
        feed(&port, &WRITE_ACK_FRAME);
        let mut t = run(&mut dwin, 0, 8);
        assert_eq!(dwin.tx_state(), TxState::SendingWrite);
        assert_eq!(dwin.stats().frames_received, 1);
        assert_eq!(dwin.stats().write_acks, 0);

        dwin.on_tx_complete();
        dwin.tick(t).unwrap();
        t += 1;
        assert_eq!(dwin.tx_state(), TxState::AwaitingWriteAck);

        feed(&port, &WRITE_ACK_FRAME);
        t = run(&mut dwin, t, 6);
        assert_eq!(dwin.tx_state(), TxState::WriteAckReceived);
        dwin.tick(t).unwrap();
        assert!(dwin.is_tx_idle());
        assert_eq!(dwin.stats().write_acks, 1);
        assert_eq!(dwin.stats().frames_received, 2);
    }

    #[test]
    fn test_reply_in_same_tick_as_completion() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());
        dwin.init(64).unwrap();

        dwin.read_vp(0x0016, 1, 0).unwrap();
        let reply = [0x5A, 0xA5, 0x06, 0x83, 0x00, 0x16, 0x01, 0x00, 0x07];
        // Everything but the last byte is parsed while still sending
        feed(&port, &reply);
        let t = run(&mut dwin, 0, reply.len() as u32 - 1);
        assert_eq!(dwin.rx_state(), RxState::WaitingData);

        dwin.on_tx_complete();
        dwin.tick(t).unwrap();
        assert_eq!(dwin.tx_state(), TxState::ReadReplyReceived);
        dwin.tick(t + 1).unwrap();
        assert!(dwin.is_tx_idle());
    }

    #[test]
    fn test_tx_timeout_returns_to_idle() {
        let port: Port<64> = Port::new();
        let config = LinkConfig::new().with_tx_timeout(100);
        let mut dwin = Dwin::new(MockUart::default(), &port, config);
        dwin.init(64).unwrap();

        dwin.read_vp(0x10, 2, 1000).unwrap();
        dwin.on_tx_complete();
        dwin.tick(1001).unwrap();
        dwin.tick(1099).unwrap();
        assert_eq!(dwin.tx_state(), TxState::AwaitingReadReply);

        dwin.tick(1100).unwrap();
        assert!(dwin.is_tx_idle());
        assert_eq!(dwin.stats().tx_timeouts, 1);
        dwin.write_vp(0x10, &[1], 1100).unwrap();
    }

    #[test]
    fn test_rx_timeout_discards_partial_frame() {
        let port: Port<64> = Port::new();
        let config = LinkConfig::new().with_rx_frame_timeout(10);
        let mut dwin = Dwin::new(MockUart::default(), &port, config);
        dwin.init(64).unwrap();

        feed(&port, &[0x5A, 0xA5, 0x05, 0x83]);
        run(&mut dwin, 0, 4);
        assert_eq!(dwin.rx_state(), RxState::WaitingData);

        // Frame started at tick 1 (second header byte)
        dwin.tick(10).unwrap();
        assert_eq!(dwin.rx_state(), RxState::WaitingData);
        dwin.tick(11).unwrap();
        assert_eq!(dwin.rx_state(), RxState::WaitingHeader);
        assert_eq!(dwin.stats().frames_discarded, 1);
    }

    #[test]
    fn test_transport_error_recovery() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());
        dwin.init(16).unwrap();

        dwin.write_vp(0x1000, &[1], 0).unwrap();
        feed(&port, &[0x5A, 0xA5, 0x03]);
        run(&mut dwin, 0, 3);
        assert_eq!(dwin.rx_state(), RxState::WaitingFunctionCode);

        dwin.on_error();
        assert_eq!(dwin.status(), LinkStatus::TransportError);
        dwin.tick(3).unwrap();

        assert_eq!(dwin.status(), LinkStatus::Operational);
        assert!(dwin.is_tx_idle());
        assert_eq!(dwin.rx_state(), RxState::WaitingHeader);
        assert!(port.ring().is_empty());
        assert_eq!(dwin.transport().aborts(), 1);
        assert_eq!(dwin.transport().receive_starts(), 2);
        assert_eq!(dwin.transport().receive_capacity(), 16);
        assert_eq!(dwin.stats().recoveries, 1);
    }

    #[test]
    fn test_recovery_retries_until_reception_restarts() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());
        dwin.init(64).unwrap();

        dwin.transport_mut().set_fail_receive(true);
        dwin.on_error();
        dwin.tick(0).unwrap();
        dwin.tick(1).unwrap();
        assert_eq!(dwin.status(), LinkStatus::TransportError);

        dwin.transport_mut().set_fail_receive(false);
        dwin.tick(2).unwrap();
        assert_eq!(dwin.status(), LinkStatus::Operational);
        assert_eq!(dwin.transport().aborts(), 3);
    }

    #[test]
    fn test_oversized_reply_not_routed() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());
        dwin.init(64).unwrap();
        dwin.register_callback(0x2000, |_| panic!("truncated frame dispatched")).unwrap();

        let reply = dwin_protocol::messages::encode_read_reply(0x2000, &[1, 2, 3, 4, 5, 6]).unwrap();
        feed(&port, &reply);
        let t = run(&mut dwin, 0, reply.len() as u32);
        assert_eq!(dwin.stats().frames_discarded, 1);
        assert_eq!(dwin.stats().frames_received, 0);

        // Framing stays aligned for the next frame
        feed(&port, &WRITE_ACK_FRAME);
        run(&mut dwin, t, 6);
        assert_eq!(dwin.stats().frames_received, 1);
    }

    #[test]
    fn test_release_returns_transport() {
        let port: Port<64> = Port::new();
        let mut dwin = Dwin::new(MockUart::default(), &port, LinkConfig::default());
        dwin.init(64).unwrap();
        dwin.write_vp(1, &[2], 0).unwrap();

        let uart = dwin.release();
        assert_eq!(uart.aborts(), 1);
        assert_eq!(uart.sent().len(), 1);
    }
}
